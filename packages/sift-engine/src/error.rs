pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid query options: {message}")]
	InvalidOptions { message: String },
	#[error("Permission oracle error: {message}")]
	Oracle { message: String },
	#[error("Candidate source error: {message}")]
	Source { message: String },
}
