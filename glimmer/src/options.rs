use glam::{uvec2, UVec2};
use serde::{Deserialize, Serialize};

use crate::{gpu, Error, Result};

macro_rules! options {
    ([ $( $(#[$meta:meta])* $name:ident: $ty:ty = $default:expr, )* ]) => {
        /// Tunables of the pipeline.
        ///
        /// Can be deserialized from a dictionary using the camel-cased field
        /// names (e.g. `{ "numPasses": 2, "useTemporalResampling": true }`);
        /// missing fields get their default values.
        #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
        #[serde(default, rename_all = "camelCase")]
        pub struct Options {
            $( $(#[$meta])* pub $name: $ty, )*
        }

        impl Default for Options {
            fn default() -> Self {
                Self {
                    $( $name: $default, )*
                }
            }
        }

        impl Options {
            /// Returns names of fields that differ between `self` and
            /// `other`; floats are compared by their bit patterns, so `NaN`
            /// is equal to itself.
            pub fn changes(&self, other: &Self) -> Vec<&'static str> {
                let mut changes = Vec::new();

                $(
                    if !self.$name.field_eq(&other.$name) {
                        changes.push(stringify!($name));
                    }
                )*

                changes
            }
        }
    };
}

options!([
    /// Number of independent resampling passes, `1..=4`.
    num_passes: usize = 1,

    use_temporal_resampling: bool = false,
    use_spatial_resampling: bool = false,
    use_tiling: bool = false,
    use_prior_distribution: bool = false,

    /// Whether to sample manifolds guided by the prior distribution and
    /// Bernoulli trials (as opposed to plain, unguided manifold sampling).
    #[serde(alias = "useOurs")]
    use_guided_sampling: bool = true,

    build_prior_thread_group_size: u32 = 128,
    num_threads_used_for_prior: u32 = 128,

    /// Size of image blocks the prior distribution gets built over.
    image_block_dim: UVec2 = uvec2(16, 16),

    num_tiles_x: u32 = 16,
    uniform_threshold: u32 = 4,
    prior_threshold: u32 = 1,
    use_constraint: bool = false,
    use_bound_prob: bool = false,

    /// Whether to sample environment light through the importance field.
    use_directional: bool = false,

    alpha: f32 = 0.8,
    max_bernoulli_trials: u32 = 128,

    #[serde(alias = "mSpatialNeighborCount")]
    spatial_neighbor_count: u32 = 1,

    /// Radius, in pixels, spatial resampling gathers neighbors from.
    #[serde(alias = "mSpatialGatherRadius")]
    spatial_gather_radius: f32 = 30.0,

    /// Maximum number of shift-mapping iterations per reused candidate;
    /// negative means unbounded.
    reuse_max_iterations: i32 = 5,

    solver_threshold: f32 = 1e-4,

    /// Maximum confidence of the temporal history.
    temporal_history_length: f32 = 20.0,

    /// Number of blocks the environment-importance field is split into.
    env_map_blocks: UVec2 = uvec2(8, 8),

    importance_map_dim: UVec2 = uvec2(512, 512),

    /// Whether kernels should populate the diagnostic counters.
    calculate_counters: bool = false,
]);

impl Options {
    pub fn validate(&self) -> Result<()> {
        if !(1..=gpu::MAX_PASSES).contains(&self.num_passes) {
            return Err(Error::InvalidOptions(format!(
                "num_passes must be within 1..={}, got {}",
                gpu::MAX_PASSES,
                self.num_passes
            )));
        }

        let dims = [
            ("image_block_dim", self.image_block_dim),
            ("env_map_blocks", self.env_map_blocks),
            ("importance_map_dim", self.importance_map_dim),
        ];

        for (name, dim) in dims {
            if dim.x == 0 || dim.y == 0 {
                return Err(Error::InvalidOptions(format!(
                    "{name} must be non-zero, got {dim}"
                )));
            }
        }

        let counts = [
            ("num_tiles_x", self.num_tiles_x),
            (
                "build_prior_thread_group_size",
                self.build_prior_thread_group_size,
            ),
            ("num_threads_used_for_prior", self.num_threads_used_for_prior),
        ];

        for (name, count) in counts {
            if count == 0 {
                return Err(Error::InvalidOptions(format!(
                    "{name} must be non-zero"
                )));
            }
        }

        Ok(())
    }

    /// Whether the prior distribution gets built before initial sampling.
    pub fn uses_prior(&self) -> bool {
        self.use_prior_distribution && self.use_guided_sampling
    }

    /// Pass flags shared by all of the kernels.
    pub fn flags(&self) -> u32 {
        use gpu::PassFlags as F;

        [
            (self.calculate_counters, F::CALCULATE_COUNTERS),
            (self.use_directional, F::USE_DIRECTIONAL),
            (self.use_guided_sampling, F::USE_GUIDED_SAMPLING),
            (self.use_constraint, F::USE_CONSTRAINT),
            (self.use_tiling, F::USE_TILING),
            (self.uses_prior(), F::USE_PRIOR),
            (self.use_bound_prob, F::USE_BOUND_PROB),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .fold(0, |flags, (_, flag)| flags | flag)
    }
}

trait FieldEq {
    fn field_eq(&self, other: &Self) -> bool;
}

macro_rules! field_eq_by_partial_eq {
    ($($ty:ty),*) => {
        $(
            impl FieldEq for $ty {
                fn field_eq(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

field_eq_by_partial_eq!(bool, u32, i32, usize, UVec2);

impl FieldEq for f32 {
    fn field_eq(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changes() {
        let a = Options::default();

        assert!(a.changes(&a.clone()).is_empty());

        let b = Options {
            num_passes: 2,
            alpha: 0.5,
            calculate_counters: true,
            ..Default::default()
        };

        assert_eq!(
            vec!["num_passes", "alpha", "calculate_counters"],
            a.changes(&b)
        );
    }

    #[test]
    fn changes_with_nan() {
        let a = Options {
            solver_threshold: f32::NAN,
            ..Default::default()
        };

        assert!(a.changes(&a.clone()).is_empty());
        assert_eq!(vec!["solver_threshold"], a.changes(&Default::default()));
    }

    #[test]
    fn validate() {
        assert!(Options::default().validate().is_ok());

        for num_passes in [0, 5] {
            let options = Options {
                num_passes,
                ..Default::default()
            };

            assert!(matches!(
                options.validate(),
                Err(Error::InvalidOptions(_))
            ));
        }

        let options = Options {
            env_map_blocks: uvec2(0, 8),
            ..Default::default()
        };

        assert!(options.validate().is_err());

        let options = Options {
            build_prior_thread_group_size: 0,
            ..Default::default()
        };

        assert!(options.validate().is_err());
    }

    #[test]
    fn deserialize() {
        let options: Options = serde_json::from_str(
            r#"{
                "maxBernoulliTrials": 64,
                "useTemporalResampling": true,
                "useTiling": true,
                "usePriorDistribution": true,
                "imageBlockDim": [8, 8],
                "mSpatialNeighborCount": 3,
                "useOurs": false,
                "solverThreshold": 1e-3
            }"#,
        )
        .unwrap();

        assert_eq!(64, options.max_bernoulli_trials);
        assert!(options.use_temporal_resampling);
        assert!(options.use_tiling);
        assert_eq!(uvec2(8, 8), options.image_block_dim);
        assert_eq!(3, options.spatial_neighbor_count);
        assert!(!options.use_guided_sampling);
        assert!(!options.uses_prior());
        assert_eq!(1e-3, options.solver_threshold);

        // Untouched fields keep their defaults
        assert_eq!(1, options.num_passes);
        assert_eq!(30.0, options.spatial_gather_radius);
    }

    #[test]
    fn flags() {
        let options = Options {
            use_prior_distribution: true,
            calculate_counters: true,
            ..Default::default()
        };

        let flags = options.flags();

        assert!(gpu::PassFlags::has(flags, gpu::PassFlags::USE_PRIOR));
        assert!(gpu::PassFlags::has(
            flags,
            gpu::PassFlags::CALCULATE_COUNTERS
        ));
        assert!(!gpu::PassFlags::has(flags, gpu::PassFlags::USE_TILING));
    }
}
