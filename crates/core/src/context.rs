//! Execution-context marker types.
//!
//! A firmware function that takes `&MainCtx` can only be reached from the
//! main loop, one that takes `&IrqCtx` only from the interrupt handler.
//! The markers have no public constructors: [`crate::Mcu`] creates them
//! when it calls into [`crate::Firmware`] and [`crate::InterruptHandler`].
//! [`crate::shared::SharedCell`] uses them to pin each side of the
//! handoff to its context.

use core::sync::atomic::{fence, Ordering::SeqCst};

/// Main-loop context marker.
pub struct MainCtx {
    _private: (),
}

/// Interrupt context marker.
///
/// While one exists, GIE is clear and no other handler can run.
pub struct IrqCtx {
    _private: (),
}

macro_rules! impl_context {
    ($name:ident) => {
        impl $name {
            #[inline(always)]
            pub(crate) fn new() -> Self {
                // Keep accesses made under the marker inside its lifetime.
                fence(SeqCst);
                Self { _private: () }
            }
        }

        impl Drop for $name {
            #[inline(always)]
            fn drop(&mut self) {
                fence(SeqCst);
            }
        }
    };
}

impl_context!(MainCtx);
impl_context!(IrqCtx);

/// Configuration context marker: main context before the loop starts,
/// with global interrupts still disabled.
pub struct InitCtx {
    main: MainCtx,
}

impl InitCtx {
    #[inline(always)]
    pub(crate) fn new() -> Self {
        InitCtx { main: MainCtx::new() }
    }

    /// Borrow the main context for initialising main-side data.
    #[inline(always)]
    pub fn main_ctx(&self) -> &MainCtx {
        &self.main
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_are_zero_sized() {
        assert_eq!(core::mem::size_of::<MainCtx>(), 0);
        assert_eq!(core::mem::size_of::<IrqCtx>(), 0);
        assert_eq!(core::mem::size_of::<InitCtx>(), 0);
    }

    #[test]
    fn test_init_yields_main() {
        let init = InitCtx::new();
        let _main: &MainCtx = init.main_ctx();
    }
}
