//! Mock payment gateway with scriptable failures.

use super::poisoned;
use crate::error::{MarketError, Result};
use crate::providers::gateway::{
    Authorization, AuthorizationRequest, Capture, PaymentGateway, PaymentIntent, PaymentOutcome,
    Transfer,
};
use crate::types::{Money, PurchaseId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoldState {
    Authorized,
    Captured,
    Cancelled,
}

#[derive(Debug, Clone)]
struct Hold {
    state: HoldState,
    amount: Money,
}

#[derive(Debug, Default)]
struct GatewayState {
    seq: u64,
    holds: HashMap<String, Hold>,
    transfers: Vec<(String, Money, String)>,
    payments: HashMap<String, PaymentOutcome>,
    fail_next_authorize: bool,
    fail_next_capture: bool,
    fail_next_cancel: bool,
    fail_next_transfer: bool,
    fail_next_payment: bool,
    split_configured: bool,
}

/// In-memory processor.
///
/// Holds, captures, cancels and transfers are tracked so tests can assert
/// on processor-side state; `fail_next_*` toggles script one-shot failures
/// for compensation-path tests.
#[derive(Debug, Clone)]
pub struct MockPaymentGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::unwrap_used)]
impl MockPaymentGateway {
    /// Create a gateway that splits funds at capture time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(GatewayState {
                split_configured: true,
                ..GatewayState::default()
            })),
        }
    }

    /// Control whether captures report an at-source split.
    pub fn set_split_configured(&self, split: bool) {
        self.state.lock().unwrap().split_configured = split;
    }

    /// Make the next `authorize_and_hold` fail.
    pub fn fail_next_authorize(&self) {
        self.state.lock().unwrap().fail_next_authorize = true;
    }

    /// Make the next `capture` fail.
    pub fn fail_next_capture(&self) {
        self.state.lock().unwrap().fail_next_capture = true;
    }

    /// Make the next `cancel_authorization` fail.
    pub fn fail_next_cancel(&self) {
        self.state.lock().unwrap().fail_next_cancel = true;
    }

    /// Make the next `create_transfer` fail.
    pub fn fail_next_transfer(&self) {
        self.state.lock().unwrap().fail_next_transfer = true;
    }

    /// Make the next `create_payment` fail.
    pub fn fail_next_payment(&self) {
        self.state.lock().unwrap().fail_next_payment = true;
    }

    /// Script the state a confirm-later payment reports.
    pub fn set_payment_outcome(&self, payment_ref: &str, outcome: PaymentOutcome) {
        self.state
            .lock()
            .unwrap()
            .payments
            .insert(payment_ref.to_string(), outcome);
    }

    /// Authorizations currently held (not captured, not cancelled).
    #[must_use]
    pub fn open_hold_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .holds
            .values()
            .filter(|h| h.state == HoldState::Authorized)
            .count()
    }

    /// True when the authorization was cancelled.
    #[must_use]
    pub fn is_cancelled(&self, authorization_ref: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .holds
            .get(authorization_ref)
            .is_some_and(|h| h.state == HoldState::Cancelled)
    }

    /// True when the authorization was captured.
    #[must_use]
    pub fn is_captured(&self, authorization_ref: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .holds
            .get(authorization_ref)
            .is_some_and(|h| h.state == HoldState::Captured)
    }

    /// Transfers issued, as `(destination, amount, idempotency_key)`.
    #[must_use]
    pub fn transfers(&self) -> Vec<(String, Money, String)> {
        self.state.lock().unwrap().transfers.clone()
    }
}

impl PaymentGateway for MockPaymentGateway {
    fn authorize_and_hold(
        &self,
        request: AuthorizationRequest,
    ) -> impl Future<Output = Result<Authorization>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            if guard.fail_next_authorize {
                guard.fail_next_authorize = false;
                return Err(MarketError::PaymentAuthorizationFailed {
                    reason: "card declined".to_string(),
                });
            }
            guard.seq += 1;
            let reference = format!("auth_{}", guard.seq);
            guard.holds.insert(
                reference.clone(),
                Hold {
                    state: HoldState::Authorized,
                    amount: request.amount,
                },
            );
            let split_configured = guard.split_configured;
            Ok(Authorization {
                reference,
                split_configured,
            })
        }
    }

    fn capture(
        &self,
        authorization_ref: &str,
        _idempotency_key: &str,
    ) -> impl Future<Output = Result<Capture>> + Send {
        let state = Arc::clone(&self.state);
        let authorization_ref = authorization_ref.to_string();

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            if guard.fail_next_capture {
                guard.fail_next_capture = false;
                return Err(MarketError::CaptureFailed {
                    reason: "processor unavailable".to_string(),
                });
            }
            let split_configured = guard.split_configured;
            let hold = guard
                .holds
                .get_mut(&authorization_ref)
                .ok_or_else(|| MarketError::CaptureFailed {
                    reason: format!("unknown authorization {authorization_ref}"),
                })?;
            match hold.state {
                HoldState::Authorized => {
                    hold.state = HoldState::Captured;
                    Ok(Capture {
                        reference: format!("cap_{authorization_ref}"),
                        split_configured,
                        already_captured: false,
                    })
                }
                HoldState::Captured => Ok(Capture {
                    reference: format!("cap_{authorization_ref}"),
                    split_configured,
                    already_captured: true,
                }),
                HoldState::Cancelled => Err(MarketError::CaptureFailed {
                    reason: "authorization was cancelled".to_string(),
                }),
            }
        }
    }

    fn cancel_authorization(
        &self,
        authorization_ref: &str,
    ) -> impl Future<Output = Result<()>> + Send {
        let state = Arc::clone(&self.state);
        let authorization_ref = authorization_ref.to_string();

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            if guard.fail_next_cancel {
                guard.fail_next_cancel = false;
                return Err(MarketError::GatewayError {
                    reason: "cancel rejected".to_string(),
                });
            }
            let hold = guard
                .holds
                .get_mut(&authorization_ref)
                .ok_or_else(|| MarketError::GatewayError {
                    reason: format!("unknown authorization {authorization_ref}"),
                })?;
            if hold.state == HoldState::Captured {
                return Err(MarketError::GatewayError {
                    reason: "cannot cancel a captured authorization".to_string(),
                });
            }
            hold.state = HoldState::Cancelled;
            Ok(())
        }
    }

    fn create_transfer(
        &self,
        amount: Money,
        destination: &str,
        idempotency_key: &str,
    ) -> impl Future<Output = Result<Transfer>> + Send {
        let state = Arc::clone(&self.state);
        let destination = destination.to_string();
        let idempotency_key = idempotency_key.to_string();

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            if guard.fail_next_transfer {
                guard.fail_next_transfer = false;
                return Err(MarketError::GatewayError {
                    reason: "transfer rejected".to_string(),
                });
            }
            guard.seq += 1;
            let reference = format!("tr_{}", guard.seq);
            guard.transfers.push((destination, amount, idempotency_key));
            Ok(Transfer { reference })
        }
    }

    fn create_payment(
        &self,
        _amount: Money,
        _buyer_ref: &str,
        purchase_id: PurchaseId,
        _idempotency_key: &str,
    ) -> impl Future<Output = Result<PaymentIntent>> + Send {
        let state = Arc::clone(&self.state);

        async move {
            let mut guard = state.lock().map_err(|_| poisoned())?;
            if guard.fail_next_payment {
                guard.fail_next_payment = false;
                return Err(MarketError::GatewayError {
                    reason: "payment creation rejected".to_string(),
                });
            }
            guard.seq += 1;
            let id = format!("pay_{}_{purchase_id}", guard.seq);
            guard.payments.insert(id.clone(), PaymentOutcome::Pending);
            Ok(PaymentIntent {
                client_secret: format!("{id}_secret"),
                id,
            })
        }
    }

    fn payment_status(
        &self,
        payment_ref: &str,
    ) -> impl Future<Output = Result<PaymentOutcome>> + Send {
        let state = Arc::clone(&self.state);
        let payment_ref = payment_ref.to_string();

        async move {
            let guard = state.lock().map_err(|_| poisoned())?;
            guard
                .payments
                .get(&payment_ref)
                .copied()
                .ok_or_else(|| MarketError::GatewayError {
                    reason: format!("unknown payment {payment_ref}"),
                })
        }
    }
}
