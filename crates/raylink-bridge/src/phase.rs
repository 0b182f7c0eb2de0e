use core::fmt;

use crate::protocol::{BridgeError, CallKind};

/// Worker bootstrap phase. Each remote call is admitted in exactly one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Uninitialized,
    Initialized,
    PoolReady,
    Rendering,
}

impl Phase {
    /// Reject `call` unless this phase admits it.
    pub fn check(self, call: CallKind) -> Result<(), BridgeError> {
        let admitted = matches!(
            (self, call),
            (Phase::Uninitialized, CallKind::Init)
                | (Phase::Initialized, CallKind::InitThreadPool)
                | (Phase::PoolReady, CallKind::RenderImage)
        );
        if admitted {
            Ok(())
        } else {
            Err(BridgeError::OutOfOrder { call, phase: self })
        }
    }

    /// Phase reached once `call` succeeded.
    pub fn after(call: CallKind) -> Phase {
        match call {
            CallKind::Init => Phase::Initialized,
            CallKind::InitThreadPool => Phase::PoolReady,
            CallKind::RenderImage => Phase::Rendering,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Uninitialized => "uninitialized",
            Phase::Initialized => "initialized",
            Phase::PoolReady => "pool-ready",
            Phase::Rendering => "rendering",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALLS: [CallKind; 3] = [
        CallKind::Init,
        CallKind::InitThreadPool,
        CallKind::RenderImage,
    ];

    #[test]
    fn walks_the_bootstrap_sequence() {
        let mut phase = Phase::default();
        for call in CALLS {
            phase.check(call).unwrap();
            phase = Phase::after(call);
        }
        assert_eq!(phase, Phase::Rendering);
    }

    #[test]
    fn each_phase_admits_exactly_one_call() {
        for phase in [
            Phase::Uninitialized,
            Phase::Initialized,
            Phase::PoolReady,
            Phase::Rendering,
        ] {
            let admitted = CALLS.iter().filter(|c| phase.check(**c).is_ok()).count();
            let expected = usize::from(phase != Phase::Rendering);
            assert_eq!(admitted, expected, "{phase}");
        }
    }

    #[test]
    fn out_of_order_error_names_call_and_phase() {
        let err = Phase::Uninitialized
            .check(CallKind::RenderImage)
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::OutOfOrder {
                call: CallKind::RenderImage,
                phase: Phase::Uninitialized
            }
        );
        assert_eq!(
            err.to_string(),
            "`renderImage` issued out of order: worker is uninitialized"
        );
    }
}
