mod command_overlay;
mod footer;

pub use command_overlay::draw_command_overlay;
pub use footer::draw_footer;
