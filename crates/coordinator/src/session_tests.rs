use super::*;
use super::chrono_stub::Timestamp;

#[test]
fn new_session_derives_pane_name() {
    let s = Session::new(
        "a1b2c3d4".to_owned(),
        "/work/repo".to_owned(),
        ProviderTag::Claude,
        None,
        None,
        None,
        Timestamp::from_epoch_ms(0),
    );
    assert_eq!(s.pane_name, "agent-a1b2c3d4");
    assert_eq!(s.status, SessionStatus::Created);
    assert!(!s.is_em);
}

#[yare::parameterized(
    claude = { ProviderTag::Claude, true, false, true },
    codex_tmux = { ProviderTag::CodexTmux, false, true, false },
    codex_app = { ProviderTag::CodexApp, false, true, false },
)]
fn caps_reflect_provider(
    provider: ProviderTag,
    stop_hook: bool,
    steer: bool,
    resume_token: bool,
) {
    let caps = provider.caps();
    assert_eq!(caps.supports_stop_hook, stop_hook);
    assert_eq!(caps.supports_steer, steer);
    assert_eq!(caps.supports_resume_token, resume_token);
}
