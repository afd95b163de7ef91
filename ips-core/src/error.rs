use std::fmt;

/// Lỗi chung khi nạp và truy vấn IPS.
#[derive(Debug, thiserror::Error)]
pub enum IpsError {
    /// Nguồn dữ liệu (file, mạng) thất bại giữa chừng.
    #[error("Không đọc được nguồn dữ liệu: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Composition không có section với mã này.
    #[error("Composition không có section {code}")]
    SectionNotFound { code: String },
    /// Mã section không thuộc bảy loại được hỗ trợ.
    #[error("Section không được hỗ trợ: {0}")]
    UnknownSection(String),
}

impl IpsError {
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        IpsError::Transport(err.into())
    }
}

impl From<std::io::Error> for IpsError {
    fn from(err: std::io::Error) -> Self {
        IpsError::Transport(Box::new(err))
    }
}

pub type IpsResult<T> = Result<T, IpsError>;

/// JSON sai cú pháp, kèm vị trí byte trong luồng.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("JSON không hợp lệ tại byte {offset}: {kind}")]
pub struct ParseError {
    pub offset: u64,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(offset: u64, kind: ParseErrorKind) -> Self {
        Self { offset, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedByte(u8),
    UnexpectedToken(&'static str),
    InvalidString(String),
    InvalidNumber(String),
    UnexpectedEnd,
    TrailingData,
    DepthLimitExceeded(usize),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::UnexpectedByte(byte) if byte.is_ascii_graphic() => {
                write!(f, "unexpected character '{}'", *byte as char)
            }
            ParseErrorKind::UnexpectedByte(byte) => write!(f, "unexpected byte 0x{byte:02x}"),
            ParseErrorKind::UnexpectedToken(token) => write!(f, "unexpected {token}"),
            ParseErrorKind::InvalidString(reason) => write!(f, "invalid string: {reason}"),
            ParseErrorKind::InvalidNumber(literal) => write!(f, "invalid number '{literal}'"),
            ParseErrorKind::UnexpectedEnd => write!(f, "unexpected end of input"),
            ParseErrorKind::TrailingData => write!(f, "data after the root value"),
            ParseErrorKind::DepthLimitExceeded(limit) => {
                write!(f, "nesting deeper than {limit} levels")
            }
        }
    }
}
