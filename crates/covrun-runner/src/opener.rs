//! Opening the finished report in the system viewer

use covrun_plan::Invocation;
use std::path::Path;

/// Command that opens `target` in the platform's default viewer
///
/// `custom` replaces the platform command; it may carry its own arguments,
/// separated by whitespace, which go before the target. Returns `None` when
/// the platform has no known viewer.
#[must_use]
pub fn open_command(target: &Path, custom: Option<&str>) -> Option<Invocation> {
    if let Some(words) = custom {
        let mut words = words.split_whitespace();
        if let Some(program) = words.next() {
            return Some(
                Invocation::new(program)
                    .args(words)
                    .arg(target.display().to_string()),
            );
        }
    }

    // The first candidate is the platform's preferred launcher
    let command = open::commands(target).into_iter().next()?;
    Some(
        Invocation::new(command.get_program().to_string_lossy()).args(
            command
                .get_args()
                .map(|arg| arg.to_string_lossy().into_owned()),
        ),
    )
}
