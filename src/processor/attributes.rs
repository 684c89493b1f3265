//! Attribute names written by the batch load processor

/// Dataset the unit was loaded into
pub const DATASET_ATTR: &str = "bq.dataset";
pub const DATASET_DESC: &str = "BigQuery dataset";

/// Table the unit was loaded into
pub const TABLE_NAME_ATTR: &str = "bq.table.name";
pub const TABLE_NAME_DESC: &str = "BigQuery table name";

pub const TABLE_SCHEMA_ATTR: &str = "bq.table.schema";
pub const TABLE_SCHEMA_DESC: &str = "BigQuery table schema, as a JSON field list";

pub const SOURCE_TYPE_ATTR: &str = "bq.load.type";
pub const SOURCE_TYPE_DESC: &str = "Format of the load payload";

pub const IGNORE_UNKNOWN_ATTR: &str = "bq.load.ignore_unknown";
pub const IGNORE_UNKNOWN_DESC: &str = "Whether values not present in the table schema are \
     ignored. When false, records with extra columns are treated as bad records.";

pub const CREATE_DISPOSITION_ATTR: &str = "bq.load.create_disposition";
pub const CREATE_DISPOSITION_DESC: &str = "Whether the job may create the table if it does not exist";

pub const WRITE_DISPOSITION_ATTR: &str = "bq.load.write_disposition";
pub const WRITE_DISPOSITION_DESC: &str = "Action taken when the table already exists";

pub const MAX_BADRECORDS_ATTR: &str = "bq.load.max_badrecords";
pub const MAX_BADRECORDS_DESC: &str = "Number of bad records tolerated before the job fails";

pub const JOB_CREATE_TIME_ATTR: &str = "bq.job.stat.creation_time";
pub const JOB_CREATE_TIME_DESC: &str = "Time the load job was created, epoch milliseconds";

pub const JOB_START_TIME_ATTR: &str = "bq.job.stat.start_time";
pub const JOB_START_TIME_DESC: &str = "Time the load job started, epoch milliseconds";

pub const JOB_END_TIME_ATTR: &str = "bq.job.stat.end_time";
pub const JOB_END_TIME_DESC: &str = "Time the load job ended, epoch milliseconds";

pub const JOB_LINK_ATTR: &str = "bq.job.link";
pub const JOB_LINK_DESC: &str = "API link to the load job";

pub const JOB_ERROR_MSG_ATTR: &str = "bq.error.message";
pub const JOB_ERROR_MSG_DESC: &str = "Load job error message";

pub const JOB_ERROR_REASON_ATTR: &str = "bq.error.reason";
pub const JOB_ERROR_REASON_DESC: &str = "Load job error reason";

pub const JOB_ERROR_LOCATION_ATTR: &str = "bq.error.location";
pub const JOB_ERROR_LOCATION_DESC: &str = "Load job error location";

/// Attributes removed from units that succeed after an earlier failure
pub const ERROR_ATTRS: [&str; 3] = [
    JOB_ERROR_MSG_ATTR,
    JOB_ERROR_REASON_ATTR,
    JOB_ERROR_LOCATION_ATTR,
];

/// Every attribute the processor writes, with its description
pub const WRITTEN_ATTRIBUTES: [(&str, &str); 15] = [
    (DATASET_ATTR, DATASET_DESC),
    (TABLE_NAME_ATTR, TABLE_NAME_DESC),
    (TABLE_SCHEMA_ATTR, TABLE_SCHEMA_DESC),
    (SOURCE_TYPE_ATTR, SOURCE_TYPE_DESC),
    (IGNORE_UNKNOWN_ATTR, IGNORE_UNKNOWN_DESC),
    (CREATE_DISPOSITION_ATTR, CREATE_DISPOSITION_DESC),
    (WRITE_DISPOSITION_ATTR, WRITE_DISPOSITION_DESC),
    (MAX_BADRECORDS_ATTR, MAX_BADRECORDS_DESC),
    (JOB_CREATE_TIME_ATTR, JOB_CREATE_TIME_DESC),
    (JOB_START_TIME_ATTR, JOB_START_TIME_DESC),
    (JOB_END_TIME_ATTR, JOB_END_TIME_DESC),
    (JOB_LINK_ATTR, JOB_LINK_DESC),
    (JOB_ERROR_MSG_ATTR, JOB_ERROR_MSG_DESC),
    (JOB_ERROR_REASON_ATTR, JOB_ERROR_REASON_DESC),
    (JOB_ERROR_LOCATION_ATTR, JOB_ERROR_LOCATION_DESC),
];
