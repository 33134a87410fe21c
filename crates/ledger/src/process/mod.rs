use crate::Ledger;

use daily::DailyProcess;
use freeze::FreezeProcess;
use generate::GenerateProcess;

pub mod daily;
pub mod freeze;
pub mod generate;

/// Entry points for the externally scheduled runs. Each run writes a
/// process-history record for audit.
pub struct Processor {
    pub daily: DailyProcess,
    pub freeze: FreezeProcess,
    pub generation: GenerateProcess,
}

impl Processor {
    pub fn new(ledger: Ledger) -> Processor {
        Processor {
            daily: DailyProcess::new(ledger.clone()),
            freeze: FreezeProcess::new(ledger.clone()),
            generation: GenerateProcess::new(ledger),
        }
    }
}
