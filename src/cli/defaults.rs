pub const MIN_MAPQ: u8 = 30;
pub const MINIMUM_READS: usize = 10;
pub const EPSILON: i64 = 250;
pub const NUMBER_COMMON_ELEMENTS: usize = 3;
pub const MATE_ELEMENT_TAG: &str = "ME";
