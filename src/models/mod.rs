pub mod alarm;
pub mod metadata;
pub mod record;

pub use alarm::{
    describe_weekdays, AlarmKind, AlarmStatus, AlarmTime, CountdownDuration, RemoteAlarm,
    Schedule, Weekday,
};
pub use metadata::{AlarmMetadata, IconKind};
pub use record::AlarmRecord;
