//! Static kernel API table: which capability each API requires and whether
//! its handler receives the calling PID.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Named permission a non-privileged process must hold to use an API.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Capability(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Capability {
    fn from(value: &str) -> Self {
        Capability(value.to_string())
    }
}

pub mod caps {
    pub const WINDOWS: &str = "windows";
    pub const CONTEXT_MENU: &str = "ui.contextmenu";
    pub const DESKTOP_WIDGETS: &str = "desktop.widgets";
    pub const DRAG_DROP: &str = "ui.dragdrop";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const EVENTS: &str = "events";
    pub const FS_READ: &str = "fs.read";
    pub const FS_WRITE: &str = "fs.write";
    pub const NETWORK: &str = "network";
    pub const STORAGE: &str = "storage";
    pub const MODULES: &str = "modules";
    pub const TASKS: &str = "tasks";
    pub const CLIPBOARD: &str = "clipboard";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiSpec {
    pub name: &'static str,
    pub capability: Option<&'static str>,
    /// Handler takes the caller's PID as its first argument.
    pub forwards_pid: bool,
}

impl ApiSpec {
    const fn new(name: &'static str, capability: Option<&'static str>, forwards_pid: bool) -> Self {
        Self {
            name,
            capability,
            forwards_pid,
        }
    }

    pub fn required_capability(&self) -> Option<Capability> {
        self.capability.map(Capability::from)
    }
}

pub const KERNEL_APIS: &[ApiSpec] = &[
    ApiSpec::new("window.create", Some(caps::WINDOWS), true),
    ApiSpec::new("window.close", Some(caps::WINDOWS), true),
    ApiSpec::new("contextmenu.register", Some(caps::CONTEXT_MENU), true),
    ApiSpec::new("widget.embed", Some(caps::DESKTOP_WIDGETS), true),
    ApiSpec::new("dragdrop.begin", Some(caps::DRAG_DROP), true),
    ApiSpec::new("notification.show", Some(caps::NOTIFICATIONS), true),
    ApiSpec::new("notification.dismiss", Some(caps::NOTIFICATIONS), true),
    ApiSpec::new("event.subscribe", Some(caps::EVENTS), true),
    ApiSpec::new("event.emit", Some(caps::EVENTS), true),
    ApiSpec::new("fs.read", Some(caps::FS_READ), false),
    ApiSpec::new("fs.list", Some(caps::FS_READ), false),
    ApiSpec::new("fs.write", Some(caps::FS_WRITE), false),
    ApiSpec::new("net.fetch", Some(caps::NETWORK), false),
    ApiSpec::new("storage.get", Some(caps::STORAGE), true),
    ApiSpec::new("storage.set", Some(caps::STORAGE), true),
    ApiSpec::new("module.request", Some(caps::MODULES), true),
    ApiSpec::new("task.spawn", Some(caps::TASKS), true),
    ApiSpec::new("clipboard.read", Some(caps::CLIPBOARD), false),
    ApiSpec::new("clipboard.write", Some(caps::CLIPBOARD), false),
    ApiSpec::new("system.info", None, false),
    ApiSpec::new("system.time", None, false),
];

pub fn lookup(api: &str) -> Option<&'static ApiSpec> {
    KERNEL_APIS.iter().find(|spec| spec.name == api)
}

/// Capability `api` requires; unknown names require none.
pub fn required_capability(api: &str) -> Option<Capability> {
    lookup(api).and_then(ApiSpec::required_capability)
}

pub fn forwards_pid(api: &str) -> bool {
    lookup(api).is_some_and(|spec| spec.forwards_pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique() {
        let mut seen = HashSet::new();
        for spec in KERNEL_APIS {
            assert!(seen.insert(spec.name), "duplicate api {}", spec.name);
        }
    }

    #[test]
    fn notification_and_event_apis_forward_pid() {
        for spec in KERNEL_APIS {
            if spec.name.starts_with("notification.") || spec.name.starts_with("event.") {
                assert!(spec.forwards_pid, "{} must receive the pid", spec.name);
            }
        }
        assert!(!forwards_pid("fs.read"));
        assert!(!forwards_pid("no.such.api"));
    }

    #[test]
    fn unmapped_api_requires_nothing() {
        assert_eq!(required_capability("system.info"), None);
        assert_eq!(required_capability("custom.thing"), None);
        assert_eq!(
            required_capability("fs.write"),
            Some(Capability::new(caps::FS_WRITE))
        );
    }
}
