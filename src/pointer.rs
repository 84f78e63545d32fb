//! Global pointer hook lifecycle
//!
//! The hook is a single owned resource: installing it yields the receiving
//! end of the latest-wins pointer slot, and dropping (or uninstalling) it
//! stops delivery before returning.

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::info;

use crate::platform::{HookHandle, Platform, PointerSink, ScreenPoint};

pub struct PointerHook {
    handle: Option<Box<dyn HookHandle>>,
}

impl PointerHook {
    pub fn install<P: Platform>(
        platform: &P,
    ) -> Result<(Self, watch::Receiver<Option<ScreenPoint>>)> {
        let (sink, samples) = PointerSink::new();
        let handle = platform
            .install_pointer_hook(sink)
            .context("Failed to install global pointer hook")?;
        info!("Pointer hook installed");
        Ok((Self { handle: Some(handle) }, samples))
    }

    pub fn uninstall(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.uninstall();
            info!("Pointer hook uninstalled");
        }
    }
}

impl Drop for PointerHook {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakePlatform;

    #[test]
    fn test_install_delivers_until_uninstalled() {
        let platform = FakePlatform::with_monitors(1);
        let (hook, mut samples) = PointerHook::install(&platform).unwrap();
        assert!(platform.hook_installed());

        assert!(platform.move_pointer(ScreenPoint::new(10, 20)));
        assert_eq!(*samples.borrow_and_update(), Some(ScreenPoint::new(10, 20)));

        hook.uninstall();
        assert!(!platform.hook_installed());
        assert!(!platform.move_pointer(ScreenPoint::new(30, 40)));
    }

    #[test]
    fn test_drop_uninstalls() {
        let platform = FakePlatform::with_monitors(1);
        {
            let (_hook, _samples) = PointerHook::install(&platform).unwrap();
            assert!(platform.hook_installed());
        }
        assert!(!platform.hook_installed());
    }

    #[test]
    fn test_install_failure_is_reported() {
        let platform = FakePlatform::with_monitors(1);
        platform.fail_hook();
        assert!(PointerHook::install(&platform).is_err());
    }
}
