/// Longest bookable range, in days.
pub const MAX_RANGE_DAYS: u64 = 366;

/// Widest window accepted by availability queries, in days.
pub const MAX_QUERY_WINDOW_DAYS: u64 = 731;

pub const MAX_RESOURCE_NAME_LEN: usize = 256;

/// Capacity of the group-commit channel feeding the WAL writer.
pub const WAL_CHANNEL_CAPACITY: usize = 4096;
