pub mod csv_table;
pub mod openai_client;

pub use csv_table::CsvTableStore;
pub use openai_client::OpenAiClient;
