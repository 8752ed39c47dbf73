// Public modules
pub mod calendar;
pub mod config;
pub mod email;
pub mod gdelt;
pub mod google;
pub mod inbox;
pub mod news;
pub mod publish;
pub mod query;
pub mod render;
pub mod section;
pub mod weather;

// Re-export commonly used types
pub use calendar::GoogleCalendarClient;
pub use config::{load_dotenv, Config};
pub use email::ResendMailer;
pub use gdelt::{Article, GdeltClient};
pub use google::GoogleCredentials;
pub use inbox::GmailClient;
pub use news::{build_news_sections, NewsError, NewsFetcher, SearchBackend};
pub use render::{render_digest_html, render_email_html};
pub use section::{Section, SectionData};
pub use weather::WeatherClient;
