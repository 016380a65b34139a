use crate::{Error, Result, SnowflakeId};

/// Validates a candidate datacenter ID against the layout's field width.
///
/// Pure and stateless; consulted once at construction so the allocation hot
/// path carries no bounds checks.
pub fn validate_datacenter_id<ID: SnowflakeId>(datacenter_id: u64) -> Result<()> {
    let max = ID::max_datacenter_id();
    if datacenter_id > max {
        return Err(Error::InvalidDatacenterId { datacenter_id, max });
    }
    Ok(())
}

/// Validates a candidate worker ID against the layout's field width.
pub fn validate_worker_id<ID: SnowflakeId>(worker_id: u64) -> Result<()> {
    let max = ID::max_worker_id();
    if worker_id > max {
        return Err(Error::InvalidWorkerId { worker_id, max });
    }
    Ok(())
}
