// libs/appointment-cell/src/services/lifecycle.rs
use crate::models::AppointmentStatus;

/// Every status change the ledger performs. Each one is a guarded write:
/// it only applies while the appointment is in one of `sources()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Confirm,
    Cancel,
    BeginSession,
    CompleteSession,
    Expire,
    CancelNoShow,
}

impl Transition {
    pub fn sources(&self) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match self {
            Transition::Confirm | Transition::Expire => &[Reserved],
            Transition::Cancel => &[Reserved, Confirmed],
            Transition::BeginSession | Transition::CancelNoShow => &[Confirmed],
            Transition::CompleteSession => &[InProgress],
        }
    }

    pub fn target(&self) -> AppointmentStatus {
        match self {
            Transition::Confirm => AppointmentStatus::Confirmed,
            Transition::Cancel | Transition::CancelNoShow => AppointmentStatus::Cancelled,
            Transition::BeginSession => AppointmentStatus::InProgress,
            Transition::CompleteSession => AppointmentStatus::Completed,
            Transition::Expire => AppointmentStatus::Expired,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Transition::Confirm => "confirm",
            Transition::Cancel => "cancel",
            Transition::BeginSession => "start",
            Transition::CompleteSession => "end",
            Transition::Expire => "expire",
            Transition::CancelNoShow => "cancel as no-show",
        }
    }
}
