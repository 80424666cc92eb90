pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{error, header, info, muted, section, success, summary_row, warn};
pub use table::{relationships_table, stats_table, TableBuilder};
pub use theme::{theme, Theme};
