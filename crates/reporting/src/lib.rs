//! Retention reporting: cohort retention curves and cumulative cohort revenue.

pub mod cohort;

pub use cohort::{
    compute_cohort_analysis, retention_matrix, CohortAnalyzer, CohortPeriod, CohortPoint, CohortRow,
};
