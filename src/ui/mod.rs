pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    error, fact_added, fact_line, fact_removed, header, info, section, success, summary_row, warn,
};
pub use progress::Spinner;
pub use table::{facts_table, stats_table};
pub use theme::{theme, Theme};
