pub mod architecture;
pub mod cache;
pub mod cannibal;
pub mod changes;
pub mod config;
pub mod crawl;
pub mod data;
pub mod decay;
pub mod error;
pub mod model;
pub mod pagespeed;
pub mod providers;
pub mod report;
pub mod robots;
pub mod run;
pub mod score;
pub mod thin;
pub mod topical;
pub mod windows;

pub use cache::{Cache, CacheKey, CacheKind, FetchCache, MemoryCache};
pub use config::{AnalysisConfig, ProviderEndpoints, ProviderKeys, Thresholds};
pub use data::{Baseline, Database};
pub use error::{AnalysisError, ProviderError, Result};
pub use model::{Issue, ModuleReport, ModuleStatus, SampleBudget, Severity};
pub use report::ReportFormat;
pub use run::{Analyzer, Integrations, Mode, RunContext, RunRequest};
pub use score::HealthScore;
