// lumen/src/core/state.rs
use super::{LoaderError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoaderState {
    #[default]
    NotInitialized,
    LoadingSucceeded,
    LoadingFailed,
    NeedDeviceResources,
}

// NotInitialized -> LoadingSucceeded | LoadingFailed, LoadingSucceeded <-> NeedDeviceResources
impl LoaderState {
    pub fn can_transition_to(self, next: LoaderState) -> bool {
        use LoaderState::*;

        matches!(
            (self, next),
            (NotInitialized, LoadingSucceeded)
                | (NotInitialized, LoadingFailed)
                | (LoadingSucceeded, NeedDeviceResources)
                | (NeedDeviceResources, LoadingSucceeded)
        )
    }
}

impl fmt::Display for LoaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotInitialized => "NotInitialized",
            Self::LoadingSucceeded => "LoadingSucceeded",
            Self::LoadingFailed => "LoadingFailed",
            Self::NeedDeviceResources => "NeedDeviceResources",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AllowedStates(&'static [LoaderState]);

impl AllowedStates {
    pub const fn new(states: &'static [LoaderState]) -> Self {
        Self(states)
    }

    pub fn contains(&self, state: LoaderState) -> bool {
        self.0.contains(&state)
    }

    pub fn enforce(&self, current: LoaderState, operation: &'static str) -> Result<()> {
        if self.contains(current) {
            return Ok(());
        }

        log::debug!("Rejected `{}` in state {}", operation, current);
        Err(LoaderError::WrongState {
            operation,
            state: current,
        })
    }
}

pub(crate) const LOAD: AllowedStates = AllowedStates::new(&[LoaderState::NotInitialized]);

pub(crate) const GPU_ACCESS: AllowedStates = AllowedStates::new(&[LoaderState::LoadingSucceeded]);

pub(crate) const IMAGE_ACCESS: AllowedStates = AllowedStates::new(&[
    LoaderState::LoadingSucceeded,
    LoaderState::NeedDeviceResources,
]);

pub(crate) const DEVICE_RESOURCES: AllowedStates = AllowedStates::new(&[
    LoaderState::LoadingSucceeded,
    LoaderState::NeedDeviceResources,
]);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;

    const ALL: [LoaderState; 4] = [
        LoaderState::NotInitialized,
        LoaderState::LoadingSucceeded,
        LoaderState::LoadingFailed,
        LoaderState::NeedDeviceResources,
    ];

    #[test]
    fn test_transition_table() {
        use LoaderState::*;

        assert!(NotInitialized.can_transition_to(LoadingSucceeded));
        assert!(NotInitialized.can_transition_to(LoadingFailed));
        assert!(LoadingSucceeded.can_transition_to(NeedDeviceResources));
        assert!(NeedDeviceResources.can_transition_to(LoadingSucceeded));

        // Nothing leaves LoadingFailed and nothing returns to NotInitialized.
        for state in ALL {
            assert!(!LoadingFailed.can_transition_to(state));
            assert!(!state.can_transition_to(NotInitialized));
        }
        assert!(!LoadingSucceeded.can_transition_to(LoadingFailed));
        assert!(!NeedDeviceResources.can_transition_to(LoadingFailed));
    }

    #[test]
    fn test_enforce_membership() {
        for state in ALL {
            assert_eq!(LOAD.enforce(state, "load").is_ok(), state == LoaderState::NotInitialized);
            assert_eq!(
                GPU_ACCESS.enforce(state, "gpu").is_ok(),
                state == LoaderState::LoadingSucceeded
            );
            assert_eq!(
                IMAGE_ACCESS.enforce(state, "info").is_ok(),
                matches!(
                    state,
                    LoaderState::LoadingSucceeded | LoaderState::NeedDeviceResources
                )
            );
        }
    }

    #[test]
    fn test_enforce_reports_operation_and_state() {
        let err = DEVICE_RESOURCES
            .enforce(LoaderState::LoadingFailed, "create_device_resources")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongState);
        match err {
            LoaderError::WrongState { operation, state } => {
                assert_eq!(operation, "create_device_resources");
                assert_eq!(state, LoaderState::LoadingFailed);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_state() {
        assert_eq!(LoaderState::default(), LoaderState::NotInitialized);
        assert_eq!(LoaderState::NeedDeviceResources.to_string(), "NeedDeviceResources");
    }
}
