//! Fault injection for the virtual service.
//!
//! Every switch can be flipped at any time, including while a stream is
//! running, so mid-stream failures can be provoked from tests.

use std::sync::atomic::{AtomicBool, Ordering};

use audio_device_core::models::error::NativeResult;

#[derive(Debug, Default)]
pub struct FaultPlan {
    /// `init()` reports the service as missing.
    pub fail_init: AtomicBool,
    pub fail_engine: AtomicBool,
    pub fail_output_mix: AtomicBool,
    /// Player and recorder creation.
    pub fail_stream: AtomicBool,
    pub fail_register: AtomicBool,
    pub fail_enqueue: AtomicBool,
    pub fail_play_state: AtomicBool,
    pub fail_record_state: AtomicBool,
}

impl FaultPlan {
    /// Clear every switch.
    pub fn reset(&self) {
        for flag in [
            &self.fail_init,
            &self.fail_engine,
            &self.fail_output_mix,
            &self.fail_stream,
            &self.fail_register,
            &self.fail_enqueue,
            &self.fail_play_state,
            &self.fail_record_state,
        ] {
            flag.store(false, Ordering::SeqCst);
        }
    }

    pub(crate) fn check(flag: &AtomicBool, result: NativeResult) -> Result<(), NativeResult> {
        if flag.load(Ordering::SeqCst) {
            Err(result)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_reports_configured_result() {
        let faults = FaultPlan::default();
        assert_eq!(FaultPlan::check(&faults.fail_enqueue, NativeResult::BufferInsufficient), Ok(()));

        faults.fail_enqueue.store(true, Ordering::SeqCst);
        assert_eq!(
            FaultPlan::check(&faults.fail_enqueue, NativeResult::BufferInsufficient),
            Err(NativeResult::BufferInsufficient)
        );

        faults.reset();
        assert!(!faults.fail_enqueue.load(Ordering::SeqCst));
    }
}
