//! Security event names
//!
//! Every security-relevant decision the pipeline makes is logged through
//! [`security_event!`] with a stable event name, category and severity, so
//! log queries do not depend on message wording.
//!
//! ```ignore
//! use flashcard_gate::observability::SecurityEvent;
//! use flashcard_gate::security_event;
//!
//! security_event!(
//!     SecurityEvent::AuthenticationFailure,
//!     login = %login,
//!     client_ip = %client_ip,
//!     "Login rejected"
//! );
//! ```

use std::fmt;

/// Security events emitted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    /// Login succeeded and a token was issued
    AuthenticationSuccess,
    /// Login rejected
    AuthenticationFailure,
    /// Presented bearer token was invalid or expired
    TokenRejected,
    /// Token slid forward on a response
    TokenRefreshed,
    /// Anonymous request to a protected path
    AccessDenied,
    /// Mutating request without a matching CSRF token
    CsrfRejected,
    /// Request from an origin outside the CORS allow-list
    OriginRejected,
    /// New account created
    UserRegistered,
    /// Registration refused (duplicate login, weak password)
    RegistrationRejected,
}

impl SecurityEvent {
    /// Get the event category for filtering/grouping
    pub fn category(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess
            | Self::AuthenticationFailure
            | Self::TokenRejected
            | Self::TokenRefreshed => "authentication",

            Self::AccessDenied => "authorization",

            Self::UserRegistered | Self::RegistrationRejected => "user_management",

            Self::CsrfRejected | Self::OriginRejected => "security",
        }
    }

    /// Get the severity level for the event
    pub fn severity(&self) -> Severity {
        match self {
            Self::AuthenticationFailure | Self::CsrfRejected | Self::OriginRejected => {
                Severity::High
            }

            Self::AuthenticationSuccess
            | Self::AccessDenied
            | Self::UserRegistered
            | Self::RegistrationRejected => Severity::Medium,

            Self::TokenRejected | Self::TokenRefreshed => Severity::Low,
        }
    }

    /// Get the event name as a string
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess => "authentication_success",
            Self::AuthenticationFailure => "authentication_failure",
            Self::TokenRejected => "token_rejected",
            Self::TokenRefreshed => "token_refreshed",
            Self::AccessDenied => "access_denied",
            Self::CsrfRejected => "csrf_rejected",
            Self::OriginRejected => "origin_rejected",
            Self::UserRegistered => "user_registered",
            Self::RegistrationRejected => "registration_rejected",
        }
    }
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Routine operations
    Low,
    /// Important state changes
    Medium,
    /// Security-relevant failures
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Log a security event with structured fields.
///
/// Adds `security_event`, `category` and `severity` fields and picks the log
/// level from the severity: high is `warn`, medium is `info`, low is `debug`.
#[macro_export]
macro_rules! security_event {
    ($event:expr, $($field:tt)*) => {{
        let event = $event;
        let category = event.category();
        let event_name = event.name();

        match event.severity() {
            $crate::observability::Severity::High => {
                ::tracing::warn!(
                    security_event = event_name,
                    category = category,
                    severity = "high",
                    $($field)*
                );
            }
            $crate::observability::Severity::Medium => {
                ::tracing::info!(
                    security_event = event_name,
                    category = category,
                    severity = "medium",
                    $($field)*
                );
            }
            $crate::observability::Severity::Low => {
                ::tracing::debug!(
                    security_event = event_name,
                    category = category,
                    severity = "low",
                    $($field)*
                );
            }
        }
    }};
}

pub use security_event;
