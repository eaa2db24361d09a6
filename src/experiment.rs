//! Deterministic two-arm experiment assignment.
//!
//! Buckets are laid out control-first, then treatment:
//!
//! ```text
//! [0, active_control)                         -> CONTROL
//! [active_control, control)                   -> unassigned (control ramp headroom)
//! [control, control + active_treatment)       -> TREATMENT
//! [control + active_treatment, total)         -> unassigned (treatment ramp headroom)
//! ```
//!
//! Growing `num_active_control_buckets` or `num_active_treatment_buckets` only moves users out of
//! the headroom, so earlier assignments are preserved during a ramp-up. Changing
//! `num_control_buckets` or `num_treatment_buckets` after traffic has been served reshuffles
//! assignments and is unsafe.
use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    hash::{combine_hash, hash_code, modulo},
    models::{CohortArm, CohortMembership},
};

/// Two-arm experiment split as provided by the user.
///
/// Use [`ExperimentConfig::prepare`] to validate it and get a [`TwoArmExperiment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentConfig {
    /// Cohort identifier, also used to salt bucket assignment.
    pub cohort_id: String,
    /// Buckets reserved for control.
    pub num_control_buckets: u32,
    /// Control buckets whose users are actually placed in control.
    pub num_active_control_buckets: u32,
    /// Buckets reserved for treatment.
    pub num_treatment_buckets: u32,
    /// Treatment buckets whose users are actually placed in treatment.
    pub num_active_treatment_buckets: u32,
}

impl ExperimentConfig {
    /// Number of control and treatment buckets used by [`ExperimentConfig::two_arm_5050`].
    pub const BUCKETS_PER_ARM_5050: u32 = 50;

    /// A 50/50 split with `num_active_control_buckets` and `num_active_treatment_buckets` out of
    /// 50 buckets each active.
    ///
    /// ```
    /// # use delivery_client::ExperimentConfig;
    /// // 5% of users in control, 5% in treatment.
    /// let experiment = ExperimentConfig::two_arm_5050("HOLD_OUT", 5, 5).prepare().unwrap();
    /// ```
    pub fn two_arm_5050(
        cohort_id: impl Into<String>,
        num_active_control_buckets: u32,
        num_active_treatment_buckets: u32,
    ) -> ExperimentConfig {
        ExperimentConfig {
            cohort_id: cohort_id.into(),
            num_control_buckets: Self::BUCKETS_PER_ARM_5050,
            num_active_control_buckets,
            num_treatment_buckets: Self::BUCKETS_PER_ARM_5050,
            num_active_treatment_buckets,
        }
    }

    /// Validate configuration and precompute values needed for assignment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first invalid field.
    pub fn prepare(self) -> Result<TwoArmExperiment, ConfigError> {
        if self.cohort_id.is_empty() {
            return Err(ConfigError::EmptyCohortId);
        }
        if self.num_active_control_buckets > self.num_control_buckets {
            return Err(ConfigError::ActiveControlBuckets {
                active: self.num_active_control_buckets,
                total: self.num_control_buckets,
            });
        }
        if self.num_active_treatment_buckets > self.num_treatment_buckets {
            return Err(ConfigError::ActiveTreatmentBuckets {
                active: self.num_active_treatment_buckets,
                total: self.num_treatment_buckets,
            });
        }

        let num_total_buckets =
            i64::from(self.num_control_buckets) + i64::from(self.num_treatment_buckets);
        if num_total_buckets == 0 {
            return Err(ConfigError::NoBuckets);
        }

        Ok(TwoArmExperiment {
            cohort_id_hash: hash_code(&self.cohort_id),
            num_total_buckets,
            config: self,
        })
    }
}

/// A validated [`ExperimentConfig`]. Immutable and cheap to share between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoArmExperiment {
    config: ExperimentConfig,
    cohort_id_hash: i32,
    num_total_buckets: i64,
}

impl TwoArmExperiment {
    /// The validated configuration.
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Bucket `identity` falls into, in `[0, num_total_buckets)`.
    pub fn bucket(&self, identity: &str) -> i64 {
        modulo(
            combine_hash(hash_code(identity), self.cohort_id_hash),
            self.num_total_buckets,
        )
    }

    /// Arm `identity` is assigned to, or `None` if it falls into inactive buckets.
    pub fn arm(&self, identity: &str) -> Option<CohortArm> {
        let bucket = self.bucket(identity);
        let control = i64::from(self.config.num_control_buckets);

        if bucket < i64::from(self.config.num_active_control_buckets) {
            Some(CohortArm::Control)
        } else if control <= bucket
            && bucket < control + i64::from(self.config.num_active_treatment_buckets)
        {
            Some(CohortArm::Treatment)
        } else {
            None
        }
    }

    /// Membership record for `identity`, or `None` if it is unassigned.
    pub fn membership(&self, identity: &str) -> Option<CohortMembership> {
        let arm = self.arm(identity)?;
        log::trace!(target: "delivery_client",
                    cohort_id = self.config.cohort_id.as_str(),
                    identity,
                    arm:serde = arm;
                    "assigned experiment arm");
        Some(CohortMembership::new(self.config.cohort_id.clone(), arm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(
        control: u32,
        active_control: u32,
        treatment: u32,
        active_treatment: u32,
    ) -> ExperimentConfig {
        ExperimentConfig {
            cohort_id: "HOLD_OUT".to_owned(),
            num_control_buckets: control,
            num_active_control_buckets: active_control,
            num_treatment_buckets: treatment,
            num_active_treatment_buckets: active_treatment,
        }
    }

    fn identities() -> impl Iterator<Item = String> {
        (0..2000).map(|i| format!("user-{i}"))
    }

    #[test]
    fn prepare_rejects_empty_cohort_id() {
        let mut c = config(50, 10, 50, 10);
        c.cohort_id = String::new();
        assert_eq!(c.prepare(), Err(ConfigError::EmptyCohortId));
    }

    #[test]
    fn prepare_rejects_too_many_active_buckets() {
        assert_eq!(
            config(10, 11, 10, 10).prepare(),
            Err(ConfigError::ActiveControlBuckets {
                active: 11,
                total: 10
            })
        );
        assert_eq!(
            config(10, 10, 10, 11).prepare(),
            Err(ConfigError::ActiveTreatmentBuckets {
                active: 11,
                total: 10
            })
        );
    }

    #[test]
    fn prepare_rejects_zero_buckets() {
        assert_eq!(config(0, 0, 0, 0).prepare(), Err(ConfigError::NoBuckets));
    }

    #[test]
    fn error_names_the_field() {
        let err = config(10, 11, 10, 10).prepare().unwrap_err();
        assert!(err.to_string().contains("numActiveControlBuckets"));
    }

    #[test]
    fn bucket_matches_hash_primitives() {
        let experiment = config(50, 50, 50, 50).prepare().unwrap();
        let expected = modulo(combine_hash(hash_code("user-1"), hash_code("HOLD_OUT")), 100);
        assert_eq!(experiment.bucket("user-1"), expected);
    }

    #[test]
    fn assignment_is_deterministic() {
        let a = config(50, 20, 50, 20).prepare().unwrap();
        let b = config(50, 20, 50, 20).prepare().unwrap();
        for identity in identities() {
            assert_eq!(a.arm(&identity), b.arm(&identity));
        }
    }

    #[test]
    fn fully_active_config_assigns_everyone() {
        let experiment = config(30, 30, 70, 70).prepare().unwrap();
        for identity in identities() {
            assert!(experiment.arm(&identity).is_some(), "{identity} unassigned");
        }
    }

    #[test]
    fn both_arms_are_reachable() {
        let experiment = ExperimentConfig::two_arm_5050("HOLD_OUT", 50, 50)
            .prepare()
            .unwrap();
        let arms: Vec<_> = identities().filter_map(|i| experiment.arm(&i)).collect();
        assert!(arms.contains(&CohortArm::Control));
        assert!(arms.contains(&CohortArm::Treatment));
    }

    #[test]
    fn inactive_buckets_are_unassigned() {
        let experiment = config(50, 0, 50, 0).prepare().unwrap();
        for identity in identities() {
            assert_eq!(experiment.arm(&identity), None);
        }
    }

    #[test]
    fn ramp_up_keeps_control_users_in_control() {
        for active in 0..50 {
            let before = config(50, active, 50, 10).prepare().unwrap();
            let after = config(50, active + 1, 50, 10).prepare().unwrap();
            for identity in identities() {
                if before.arm(&identity) == Some(CohortArm::Control) {
                    assert_eq!(after.arm(&identity), Some(CohortArm::Control));
                }
            }
        }
    }

    #[test]
    fn ramp_up_keeps_treatment_users_in_treatment() {
        let before = config(50, 10, 50, 5).prepare().unwrap();
        let after = config(50, 10, 50, 25).prepare().unwrap();
        for identity in identities() {
            if before.arm(&identity) == Some(CohortArm::Treatment) {
                assert_eq!(after.arm(&identity), Some(CohortArm::Treatment));
            }
        }
    }

    #[test]
    fn membership_carries_cohort_id() {
        let experiment = config(1, 1, 0, 0).prepare().unwrap();
        let membership = experiment.membership("anyone").unwrap();
        assert_eq!(membership.cohort_id, "HOLD_OUT");
        assert_eq!(membership.arm, CohortArm::Control);
        assert_eq!(membership.user_info, None);
    }
}
