use super::helpers::validate_range;
use crate::schema::TermbridgeConfig;

pub(crate) fn validate_terminal(errors: &mut Vec<String>, config: &TermbridgeConfig) {
    validate_range(errors, "terminal.cols", config.terminal.cols.into(), 1, 1000);
    validate_range(errors, "terminal.rows", config.terminal.rows.into(), 1, 500);

    if config.terminal.detach_byte().is_none() {
        errors.push(format!(
            "terminal.detach_key = {:?} must be a single character from @ A-Z [ \\ ] ^ _",
            config.terminal.detach_key
        ));
    }
}
