pub mod audience;
pub mod campaigns;
pub mod messages;
pub mod templates;
