//! Deferred event delivery.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Deque;

use super::{Event, EventCallback, ExecContext, WorkNotifier};

struct DispatchState<const N: usize> {
    queue: Deque<Event, N>,
    callback: Option<EventCallback>,
    notifier: Option<WorkNotifier>,
    dropped: u32,
}

/// Routes events to the user callback.
///
/// Events raised in interrupt context are pushed onto a fixed-capacity queue
/// and the platform notifier is invoked; the queue is drained by [`process`]
/// from a non-interrupt context. A full queue drops the event and logs a
/// warning. Events raised in thread context are delivered immediately, after
/// anything still queued, so the callback sees events in the order they were
/// raised.
///
/// The callback is never invoked while the internal lock is held, so it may
/// call back into the stepper.
///
/// [`process`]: EventDispatcher::process
pub struct EventDispatcher<const N: usize> {
    state: Mutex<RefCell<DispatchState<N>>>,
}

impl<const N: usize> EventDispatcher<N> {
    /// Create a dispatcher with no callback.
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(DispatchState {
                queue: Deque::new(),
                callback: None,
                notifier: None,
                dropped: 0,
            })),
        }
    }

    /// Set or clear the event callback.
    pub fn set_callback(&self, callback: Option<EventCallback>) {
        critical_section::with(|cs| self.state.borrow_ref_mut(cs).callback = callback);
    }

    /// Set or clear the deferred-work notifier.
    pub fn set_notifier(&self, notifier: Option<WorkNotifier>) {
        critical_section::with(|cs| self.state.borrow_ref_mut(cs).notifier = notifier);
    }

    /// Deliver or queue an event depending on the context it was raised in.
    pub fn raise(&self, event: Event, context: ExecContext) {
        match context {
            ExecContext::Thread => {
                self.process();
                let callback = critical_section::with(|cs| self.state.borrow_ref(cs).callback);
                if let Some(callback) = callback {
                    callback(event);
                }
            }
            ExecContext::Interrupt => {
                let queued = critical_section::with(|cs| {
                    let mut state = self.state.borrow_ref_mut(cs);
                    match state.queue.push_back(event) {
                        Ok(()) => Ok(state.notifier),
                        Err(_) => {
                            state.dropped = state.dropped.saturating_add(1);
                            Err(())
                        }
                    }
                });

                match queued {
                    Ok(Some(notify)) => notify(),
                    Ok(None) => {}
                    Err(()) => warn!("event queue full, dropped {}", event),
                }
            }
        }
    }

    /// Drain queued events into the callback.
    ///
    /// Must be called from a non-interrupt context. Returns the number of
    /// events taken off the queue.
    pub fn process(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = critical_section::with(|cs| {
                let mut state = self.state.borrow_ref_mut(cs);
                let callback = state.callback;
                state.queue.pop_front().map(|event| (event, callback))
            });

            let Some((event, callback)) = next else {
                break;
            };

            if let Some(callback) = callback {
                callback(event);
            }
            delivered += 1;
        }
        delivered
    }

    /// Number of events waiting for [`process`](Self::process).
    pub fn pending(&self) -> usize {
        critical_section::with(|cs| self.state.borrow_ref(cs).queue.len())
    }

    /// Number of events lost to a full queue.
    pub fn dropped(&self) -> u32 {
        critical_section::with(|cs| self.state.borrow_ref(cs).dropped)
    }
}

impl<const N: usize> Default for EventDispatcher<N> {
    fn default() -> Self {
        Self::new()
    }
}
