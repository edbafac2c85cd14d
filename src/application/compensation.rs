use async_trait::async_trait;

use crate::domain::ports::{InconsistencyReport, InconsistencyStage, StockCompensation};

/// Default hook: records what moved so the stock can be corrected by hand.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualReconciliation;

#[async_trait]
impl StockCompensation for ManualReconciliation {
    async fn on_inconsistency(&self, report: &InconsistencyReport) {
        let stage = match report.stage {
            InconsistencyStage::StockCommit => "stock commit",
            InconsistencyStage::Persistence => "order persistence",
        };
        for adjustment in &report.applied {
            log::error!(
                "Manual stock correction needed after failed {} for user {}: product {} was adjusted by {} ({})",
                stage,
                report.user_id,
                adjustment.product_id,
                adjustment.delta,
                report.cause
            );
        }
    }
}
