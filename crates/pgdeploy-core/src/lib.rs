//! pgdeploy-core
//!
//! Building blocks for provisioning a PostgreSQL primary/replica cluster:
//! render descriptors, drive terraform, read back the topology, write an
//! ansible inventory and run the configuration playbook.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（params, descriptor, topology, inventory, state, outcome, errors, ids）
//! - **render**: パラメータ → descriptor テキスト（純粋関数、エスケープ込み）
//! - **ports**: 抽象化レイヤー（ArtifactStore, CommandRunner, Clock, IdGenerator）
//! - **impls**: 実装（LocalArtifactStore, ProcessRunner）
//! - **app**: アプリケーションロジック（builder, drivers, sequencer, requests, config）
//! - **observability**: ログ設定

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod render;
