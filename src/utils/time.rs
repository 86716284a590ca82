use chrono::{DateTime, FixedOffset, Utc};

pub const DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M";

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn to_display(dt: DateTime<Utc>, offset: FixedOffset) -> String {
    dt.with_timezone(&offset).format(DISPLAY_FORMAT).to_string()
}
