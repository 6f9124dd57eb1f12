use crate::detect::PolicyTable;
use crate::scheduler::VerdictBoard;

#[derive(Clone)]
pub struct AppState {
    pub board: VerdictBoard,
    pub policy: PolicyTable,
}
