//! Decides when the worker has to reload its model.
//!
//! The worker keeps one model resident. Switching the model, the device or
//! the compute type needs a reload; everything else is per job.

use faststt_types::{JobParameters, ModelSelection};

/// What the worker was last asked to load. Empty at the start of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    last: Option<ModelSelection>,
}

impl SessionState {
    pub fn last_selection(&self) -> Option<&ModelSelection> {
        self.last.as_ref()
    }

    /// Forget the last selection so the next job reloads.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// True when `params` selects a different model, device or compute type
/// than the last committed job, and always on the first job of a session.
pub fn requires_reload(state: &SessionState, params: &JobParameters) -> bool {
    match &state.last {
        None => true,
        Some(last) => {
            last.model_id != params.model_id
                || last.device != params.device
                || last.compute_type != params.compute_type
        }
    }
}

/// Record `params` as the loaded selection. Call once per accepted job,
/// after [`requires_reload`] was evaluated for it.
pub fn commit(state: &mut SessionState, params: &JobParameters) {
    state.last = Some(params.selection());
}

#[cfg(test)]
mod tests {
    use faststt_types::{ComputeType, Device};

    use super::*;

    fn small_cpu() -> JobParameters {
        JobParameters::new("small", Device::Cpu, ComputeType::Float32)
    }

    #[test]
    fn test_first_job_reloads() {
        assert!(requires_reload(&SessionState::default(), &small_cpu()));
    }

    #[test]
    fn test_same_selection_does_not_reload() {
        let mut state = SessionState::default();
        let params = small_cpu();
        assert!(requires_reload(&state, &params));
        commit(&mut state, &params);
        assert!(!requires_reload(&state, &params));
    }

    #[test]
    fn test_each_tracked_field_triggers_reload() {
        let mut state = SessionState::default();
        commit(&mut state, &small_cpu());

        let variants = [
            JobParameters::new("medium", Device::Cpu, ComputeType::Float32),
            JobParameters::new("small", Device::Cuda, ComputeType::Float32),
            JobParameters::new("small", Device::Cpu, ComputeType::Int8),
        ];
        for params in variants {
            assert!(requires_reload(&state, &params), "{params:?}");
            let mut next = state.clone();
            commit(&mut next, &params);
            assert!(!requires_reload(&next, &params));
        }
    }

    #[test]
    fn test_untracked_fields_do_not_reload() {
        let mut state = SessionState::default();
        commit(&mut state, &small_cpu());

        let params = small_cpu()
            .with_language("fr")
            .with_auto_detect(true)
            .with_report_timings(true)
            .with_precision_level(1);
        assert!(!requires_reload(&state, &params));
    }

    #[test]
    fn test_requires_reload_is_pure() {
        let state = SessionState::default();
        let params = small_cpu();
        assert!(requires_reload(&state, &params));
        assert!(requires_reload(&state, &params));
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn test_reset_forces_reload() {
        let mut state = SessionState::default();
        commit(&mut state, &small_cpu());
        state.reset();
        assert!(state.last_selection().is_none());
        assert!(requires_reload(&state, &small_cpu()));
    }
}
