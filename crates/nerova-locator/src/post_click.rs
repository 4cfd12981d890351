use std::time::Duration;

use nerova_driver::RemoteDriver;
use nerova_types::PauseSignal;

use crate::errors::ResolverError;

/// Inter-keystroke delay while typing (spec.md §4.2 "Post-click effects").
const TYPE_DELAY_MS: u64 = 120;

/// Runs the optional clear/type/submit effects after a click resolves,
/// checking the pause signal between keystrokes so a requested pause takes
/// effect mid-type rather than only between actions (spec.md §5).
pub async fn run_post_click_effects(
    driver: &RemoteDriver,
    content: Option<&str>,
    clear: bool,
    submit: bool,
    pause: &dyn PauseSignal,
) -> Result<(), ResolverError> {
    if clear {
        check_pause(pause)?;
        driver.clear_active_input().await?;
    }

    if let Some(text) = content {
        for ch in text.chars() {
            check_pause(pause)?;
            driver.type_char(ch).await?;
            tokio::time::sleep(Duration::from_millis(TYPE_DELAY_MS)).await;
        }
    }

    if submit {
        check_pause(pause)?;
        driver.press_enter().await?;
    }

    Ok(())
}

fn check_pause(pause: &dyn PauseSignal) -> Result<(), ResolverError> {
    if pause.abort_requested() || pause.pause_requested() {
        Err(ResolverError::PauseInterrupt)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nerova_types::NeverPause;

    struct AlwaysPause;
    impl PauseSignal for AlwaysPause {
        fn pause_requested(&self) -> bool {
            true
        }
        fn abort_requested(&self) -> bool {
            false
        }
        fn cancellation_token(&self) -> tokio_util::sync::CancellationToken {
            tokio_util::sync::CancellationToken::new()
        }
    }

    #[test]
    fn never_pause_passes_check() {
        assert!(check_pause(&NeverPause).is_ok());
    }

    #[test]
    fn pause_requested_interrupts() {
        assert!(matches!(
            check_pause(&AlwaysPause),
            Err(ResolverError::PauseInterrupt)
        ));
    }
}
