use crate::core::errors::ClientError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Authorization role a request is made under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facade {
    Public,
    User,
    Merchant,
    Pos,
    Payroll,
}

impl Facade {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::User => "user",
            Self::Merchant => "merchant",
            Self::Pos => "pos",
            Self::Payroll => "payroll",
        }
    }

    /// Everything except `Public` needs a signed request.
    pub const fn requires_signature(self) -> bool {
        !matches!(self, Self::Public)
    }
}

impl fmt::Display for Facade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Facade {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "user" => Ok(Self::User),
            "merchant" => Ok(Self::Merchant),
            "pos" => Ok(Self::Pos),
            "payroll" => Ok(Self::Payroll),
            other => Err(ClientError::InvalidParameters(format!(
                "Unknown facade: {}",
                other
            ))),
        }
    }
}

/// Default facade plus a single-use override.
///
/// The override applies to the next request only. Concurrent overrides on
/// one client race with each other; callers are expected to issue the
/// overridden request before setting another override.
#[derive(Debug)]
pub struct FacadeState {
    default: Facade,
    active: Mutex<Option<Facade>>,
}

impl FacadeState {
    pub fn new(default: Facade) -> Self {
        Self {
            default,
            active: Mutex::new(None),
        }
    }

    pub const fn default_facade(&self) -> Facade {
        self.default
    }

    pub fn active(&self) -> Facade {
        self.lock().unwrap_or(self.default)
    }

    pub fn set_override(&self, facade: Facade) {
        *self.lock() = Some(facade);
    }

    pub fn reset(&self) {
        *self.lock() = None;
    }

    /// Facade for the request about to start, and a guard that restores the
    /// default once the request is over, whichever way it ends.
    pub fn begin_request(&self) -> (Facade, FacadeReset<'_>) {
        (self.active(), FacadeReset { state: self })
    }

    fn lock(&self) -> MutexGuard<'_, Option<Facade>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Restores the default facade on drop.
#[derive(Debug)]
pub struct FacadeReset<'a> {
    state: &'a FacadeState,
}

impl Drop for FacadeReset<'_> {
    fn drop(&mut self) {
        self.state.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_names() {
        for facade in [
            Facade::Public,
            Facade::User,
            Facade::Merchant,
            Facade::Pos,
            Facade::Payroll,
        ] {
            assert_eq!(facade.as_str().parse::<Facade>().unwrap(), facade);
        }
        assert!("admin".parse::<Facade>().is_err());
        assert_eq!(
            serde_json::to_string(&Facade::Merchant).unwrap(),
            "\"merchant\""
        );
    }

    #[test]
    fn test_only_public_is_unsigned() {
        assert!(!Facade::Public.requires_signature());
        assert!(Facade::User.requires_signature());
        assert!(Facade::Merchant.requires_signature());
    }

    #[test]
    fn test_override_is_single_use() {
        let state = FacadeState::new(Facade::Merchant);
        state.set_override(Facade::Public);
        assert_eq!(state.active(), Facade::Public);

        {
            let (facade, _reset) = state.begin_request();
            assert_eq!(facade, Facade::Public);
        }

        assert_eq!(state.active(), Facade::Merchant);
        let (facade, _reset) = state.begin_request();
        assert_eq!(facade, Facade::Merchant);
    }

    #[test]
    fn test_override_stays_until_a_request_starts() {
        let state = FacadeState::new(Facade::Public);
        state.set_override(Facade::User);
        assert_eq!(state.active(), Facade::User);
        assert_eq!(state.active(), Facade::User);
        assert_eq!(state.default_facade(), Facade::Public);
    }
}
