// tests/omnixerror_tests.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[TESTS]Xyn>=====S===t===u===d===i===o===s======[R|$>

#[cfg(test)]
mod tests {
    use xage_ntm::omnixtracker::NTMError;
    use ndarray_stats::errors::MinMaxError;

    #[test]
    fn test_invalid_config_error() {
        let error = NTMError::InvalidConfig("num_heads must be positive".to_string());
        assert_eq!(format!("{}", error), "Invalid configuration: num_heads must be positive");
    }

    #[test]
    fn test_shape_mismatch_error() {
        let error = NTMError::shape(&[1, 8], &[1, 5]);
        assert_eq!(format!("{}", error), "Shape mismatch: expected [1, 8], actual [1, 5]");
    }

    #[test]
    fn test_not_initialized_error() {
        let error = NTMError::NotInitialized("call init_sequence before step".to_string());
        assert_eq!(format!("{}", error), "Not initialized: call init_sequence before step");
    }

    #[test]
    fn test_invalid_argument_error() {
        let error = NTMError::InvalidArgument("negative std".to_string());
        assert_eq!(format!("{}", error), "Invalid argument: negative std");
    }

    #[test]
    fn test_computation_error() {
        let error = NTMError::ComputationError("NaN in attention".to_string());
        assert_eq!(format!("{}", error), "Computation error: NaN in attention");
    }

    #[test]
    fn test_memory_error() {
        let error = NTMError::MemoryError("bias cannot be broadcast".to_string());
        assert_eq!(format!("{}", error), "Memory error: bias cannot be broadcast");
    }

    #[test]
    fn test_min_max_conversion() {
        assert!(matches!(NTMError::from(MinMaxError::EmptyInput), NTMError::InvalidArgument(_)));
        assert!(matches!(NTMError::from(MinMaxError::UndefinedOrder), NTMError::ComputationError(_)));
    }
}
