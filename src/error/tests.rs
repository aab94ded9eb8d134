//! Tests for error types.

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("invalid model id");
        assert_eq!(err.to_string(), "configuration error: invalid model id");
    }

    #[test]
    fn test_embedding_error_conversion() {
        let emb_err = EmbeddingError::ModelLoad("model.onnx not found".to_string());
        let err: Error = emb_err.into();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[test]
    fn test_embedding_error_is_cloneable() {
        let err = EmbeddingError::ModelLoad("network unreachable".to_string());
        let shared = err.clone();
        assert_eq!(err, shared);
        assert_eq!(
            shared.to_string(),
            "failed to load model: network unreachable"
        );
    }

    #[test]
    fn test_protocol_error_conversion() {
        let err: Error = ProtocolError::MissingText.into();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(
            err.to_string(),
            "protocol error: message is missing the 'text' field"
        );
    }

    #[test]
    fn test_search_error_dimension_mismatch() {
        let err = SearchError::DimensionMismatch {
            expected: 384,
            got: 3,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 384, got 3");
    }

    #[test]
    fn test_search_error_unavailable() {
        let err = SearchError::Unavailable("worker closed".to_string());
        assert!(err.to_string().contains("temporarily unavailable"));
    }

    #[test]
    fn test_content_error_parse() {
        let err = ContentError::parse("docs/intro.json", "expected value at line 1");
        assert_eq!(
            err.to_string(),
            "failed to parse 'docs/intro.json': expected value at line 1"
        );
    }

    #[test]
    fn test_content_error_conversion() {
        let err: Error = ContentError::NotFound("guides/setup".to_string()).into();
        assert!(matches!(err, Error::Content(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_embedding_error_variants() {
        assert_eq!(
            EmbeddingError::Runtime("session failed".to_string()).to_string(),
            "ONNX runtime error: session failed"
        );
        assert_eq!(
            EmbeddingError::Tokenization("invalid token".to_string()).to_string(),
            "tokenization error: invalid token"
        );
        assert_eq!(
            EmbeddingError::Inference("shape mismatch".to_string()).to_string(),
            "inference error: shape mismatch"
        );
        assert_eq!(
            EmbeddingError::WorkerClosed("thread exited".to_string()).to_string(),
            "worker closed: thread exited"
        );
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn inner() -> Result<i32> {
            Err(Error::config("inner error"))
        }

        fn outer() -> Result<i32> {
            let _ = inner()?;
            Ok(0)
        }

        let result = outer();
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "configuration error: inner error"
        );
    }
}
