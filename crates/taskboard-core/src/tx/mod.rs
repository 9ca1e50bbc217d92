//! Tx - 書き込み経路（リクエスト構築と効果の解釈）

pub mod builder;
pub mod effects;

pub use self::builder::{
    BOARD_MODULE, CallArg, CreationHint, DEFAULT_CLOCK_OBJECT_ID, MoveCall, Operation,
    OperationKind, PureArg, TransactionBuilder, TransactionRequest,
};
pub use self::effects::{
    ChangeKind, EffectsExtractor, ExecutionStatus, Extraction, LedgerEvent, ObjectChange,
    TransactionEffects, TransactionResponse,
};
