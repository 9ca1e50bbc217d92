//! Codec - レジャーの生オブジェクト表現を型付きエンティティに変換する
//!
//! # 構成
//! - **raw**: フィールドバッグの低レベルアクセス（u64 文字列, アドレス, バイト列, UID）
//! - **option**: OptionCodec（optional の複数ワイヤ形状）
//! - **variant**: VariantCodec（タグ付きバリアント → インデックス）
//! - **entity**: EntityCodec（上記 + TableWalker で Board / Task / Member を組み立てる）
//!
//! # 設計原則
//! - 概念ごとにデコーダを 1 つ。新しいワイヤ形状は 1 ケースの追加で済む
//! - 形状は固定の優先順で試す
//! - 入力を変更しない

pub mod entity;
pub mod option;
pub mod raw;
pub mod variant;

pub use self::entity::EntityCodec;
pub use self::option::{OptionCodec, OptionShape};
pub use self::variant::{VariantCodec, VariantShape};
