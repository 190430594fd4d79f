//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! 外部システム（ファイルシステム、terraform / ansible プロセス、時刻）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod artifact_store;
pub mod clock;
pub mod command_runner;
pub mod id_generator;

// 主要な trait を再エクスポート
pub use self::artifact_store::ArtifactStore;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::command_runner::{CommandOutput, CommandRunner, Invocation, RunError};
pub use self::id_generator::{IdGenerator, UlidGenerator};
