//! Single-flight flags for upload, comment generation and export

use crate::error::{Result, SoilError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A flag that at most one operation may hold. A second caller is rejected
/// with `SoilError::Busy` instead of waiting.
#[derive(Debug, Clone)]
pub struct InFlight {
    name: &'static str,
    flag: Arc<AtomicBool>,
}

impl InFlight {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn try_begin(&self) -> Result<InFlightGuard> {
        self.flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SoilError::Busy(self.name))?;
        Ok(InFlightGuard {
            flag: Arc::clone(&self.flag),
        })
    }

    pub fn is_active(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Clears the flag when dropped, on success and failure alike
#[derive(Debug)]
pub struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_caller_rejected() {
        let export = InFlight::new("export");
        let guard = export.try_begin().unwrap();
        assert!(export.is_active());

        let err = export.try_begin().unwrap_err();
        assert_eq!(err.to_string(), "export already in progress");

        drop(guard);
        assert!(!export.is_active());
        assert!(export.try_begin().is_ok());
    }

    #[test]
    fn test_flag_released_after_failure() {
        let upload = InFlight::new("upload");
        let failing = || -> Result<()> {
            let _guard = upload.try_begin()?;
            Err(SoilError::InvalidInput("bad file".into()))
        };
        assert!(failing().is_err());
        assert!(!upload.is_active());
    }
}
