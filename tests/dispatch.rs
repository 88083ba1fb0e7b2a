//! Event fan-out and command routing through a live connection

mod common;

use cassbot::application::messaging::DispatchReport;
use cassbot::domain::entities::{Event, EventKind};
use common::{eventually, Behaviour, Harness};

fn line(target: &str, text: &str) -> (String, String) {
    (target.to_string(), text.to_string())
}

#[tokio::test]
async fn test_failing_handler_does_not_stop_others() {
    let h = Harness::new();
    h.add_recorder("Broken", vec![EventKind::Privmsg], vec![], Behaviour::Fail);
    h.add_recorder("Healthy", vec![EventKind::Privmsg], vec![], Behaviour::Ok);

    let report = h.say("bob!b@host", "#a", "just chatting").await;

    assert_eq!(report, DispatchReport { invoked: 2, failed: 1 });
    let mut seen = h.seen();
    seen.sort();
    assert_eq!(seen, vec!["Broken:privmsg", "Healthy:privmsg"]);
    assert!(h.transport.lines().is_empty());
}

#[tokio::test]
async fn test_panicking_handler_is_contained() {
    let h = Harness::new();
    h.add_recorder("Bomb", vec![EventKind::Privmsg], vec![], Behaviour::Panic);
    h.add_recorder("Calm", vec![EventKind::Privmsg], vec![], Behaviour::Ok);

    let report = h.say("bob!b@host", "#a", "hello").await;

    assert_eq!(report, DispatchReport { invoked: 2, failed: 1 });
    assert!(h.seen().contains(&"Calm:privmsg".to_string()));

    // the plugin stays enabled and keeps receiving events
    let report = h.say("bob!b@host", "#a", "again").await;
    assert_eq!(report.invoked, 2);
    assert!(h.registry.is_enabled("Bomb"));
}

#[tokio::test]
async fn test_default_handling_runs_first() {
    let h = Harness::new();
    h.add_recorder("Watcher", vec![EventKind::Joined], vec![], Behaviour::Ok);

    h.event(Event::Joined { channel: "#a".into() }).await;

    assert_eq!(h.seen(), vec!["Watcher:joined:#a:in=true"]);
    assert_eq!(h.conn.channels(), vec!["#a"]);
}

#[tokio::test]
async fn test_sign_on_joins_configured_channels() {
    let h = Harness::new();
    h.event(Event::SignedOn).await;

    assert!(h.conn.is_signed_on());
    assert_eq!(h.transport.joins(), vec!["#a", "#b"]);
}

#[tokio::test]
async fn test_unknown_command_gets_one_apology() {
    let h = Harness::new();

    let report = h.say("bob!b@host", "#a", "cassbot: bogus thing").await;

    assert_eq!(report.invoked, 0);
    assert_eq!(
        h.transport.lines(),
        vec![line("#a", "bob: Sorry, I don't understand 'bogus'. :(")]
    );
}

#[tokio::test]
async fn test_failing_command_handler_gets_no_apology() {
    let h = Harness::new();
    h.add_recorder("Broken", vec![], vec!["boom"], Behaviour::Fail);

    let report = h.say("bob!b@host", "#a", "!BOOM now").await;

    assert_eq!(report, DispatchReport { invoked: 1, failed: 1 });
    assert_eq!(h.seen(), vec!["Broken:boom now"]);
    assert!(h.transport.lines().is_empty());
}

#[tokio::test]
async fn test_every_handler_of_a_verb_runs() {
    let h = Harness::new();
    h.add_recorder("First", vec![], vec!["ping"], Behaviour::Ok);
    h.add_recorder("Second", vec![], vec!["ping"], Behaviour::Ok);

    let report = h.say("bob!b@host", "cassbot", "ping 'a b'").await;

    assert_eq!(report.invoked, 2);
    let mut seen = h.seen();
    seen.sort();
    assert_eq!(seen, vec!["First:ping a b", "Second:ping a b"]);
}

#[tokio::test]
async fn test_unparseable_command_gets_one_reply() {
    let h = Harness::new();
    h.add_recorder("Say", vec![], vec!["say"], Behaviour::Ok);

    h.say("bob!b@host", "#a", "!say 'unterminated").await;

    let lines = h.transport.lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].0, "#a");
    assert!(lines[0].1.starts_with("bob: I couldn't parse that"));
    assert!(h.seen().is_empty());
}

#[tokio::test]
async fn test_private_reply_has_no_prefix() {
    let h = Harness::new();
    h.registry.enable_by_name("LogsCommand").unwrap();

    h.say("bob!b@host", "cassbot", "logs").await;

    assert_eq!(
        h.transport.lines(),
        vec![line("bob", "http://www.eflorenzano.com/cassbot/")]
    );
}

#[tokio::test]
async fn test_outbound_messages_are_observed() {
    let h = Harness::new();
    h.add_recorder("Ear", vec![EventKind::MessageSent], vec![], Behaviour::Ok);

    h.conn.msg("#a", "hello").await.unwrap();

    assert_eq!(h.transport.lines(), vec![line("#a", "hello")]);
    assert!(eventually(|| h.seen() == vec!["Ear:message-sent"]).await);
}

#[tokio::test]
async fn test_admin_commands_require_privilege() {
    let h = Harness::new();
    h.registry.enable_by_name("Admin").unwrap();

    h.say("bob!b@host", "#a", "!modenable LinkChecker").await;
    assert_eq!(
        h.transport.take_lines(),
        vec![line("#a", "bob: You need the admin privilege to do that.")]
    );
    assert!(!h.registry.is_enabled("LinkChecker"));

    h.service.grant("boss!*@*", "admin");
    h.say("boss!b@office", "#a", "!modenable LinkChecker Nope").await;
    assert_eq!(
        h.transport.take_lines(),
        vec![
            line("#a", "boss: Module LinkChecker loaded."),
            line("#a", "boss: Module Nope marked for loading once it is found."),
        ]
    );

    h.say("bob!b@host", "#a", "!modules").await;
    assert_eq!(
        h.transport.take_lines(),
        vec![
            line("#a", "bob: loaded modules: Admin, LinkChecker"),
            line("#a", "bob: modules enabled but not found: Nope"),
            line("#a", "bob: other available modules: BotLogger, BuildCommand, LogsCommand, ZendeskLinks"),
        ]
    );

    h.say("boss!b@office", "#a", "!moddisable LinkChecker Ghost").await;
    assert_eq!(
        h.transport.take_lines(),
        vec![
            line("#a", "boss: Module LinkChecker disabled."),
            line("#a", "boss: Module Ghost is not loaded."),
        ]
    );
}

#[tokio::test]
async fn test_delegated_admin_can_grant() {
    let h = Harness::new();
    h.registry.enable_by_name("Admin").unwrap();
    h.service.grant("boss!*@*", "admin");
    h.service.grant("admin", "ops");

    h.say("boss!b@office", "#a", "!grant 'amy!*@*' admin").await;
    h.say("amy!a@home", "#a", "!whohas admin").await;

    assert_eq!(
        h.transport.take_lines(),
        vec![
            line("#a", "boss: Granted admin to amy!*@*."),
            line("#a", "amy: Holders of admin: amy!*@*, boss!*@*"),
        ]
    );
    assert!(h.service.principal_has("amy!a@home", "ops"));
}

#[tokio::test]
async fn test_link_checker_posts_links() {
    let h = Harness::new();
    h.registry.enable_by_name("LinkChecker").unwrap();

    h.say("bob!b@host", "#a", "is #1234 fixed?").await;

    assert_eq!(
        h.transport.lines(),
        vec![line("#a", "https://issues.apache.org/jira/browse/CASSANDRA-1234")]
    );
}

#[tokio::test]
async fn test_blacklist_needs_channel_privilege_for_others() {
    let h = Harness::new();
    h.registry.enable_by_name("BotLogger").unwrap();

    h.say("bob!b@host", "#a", "!blacklist evn").await;
    assert_eq!(
        h.transport.take_lines(),
        vec![line(
            "#a",
            "bob: blacklisting other names requires the log_blacklist_admin privilege in this channel."
        )]
    );

    h.service.grant("bob!*@*", "#a:log_blacklist_admin");
    h.say("bob!b@host", "#a", "!blacklist evn").await;
    h.say("bob!b@host", "#a", "!blacklist me").await;
    h.say("bob!b@host", "#a", "!show blacklist").await;

    assert_eq!(
        h.transport.take_lines(),
        vec![
            line("#a", "bob: Blacklisted 'evn'"),
            line("#a", "bob: Blacklisting you for #a."),
            line("#a", "bob: Blacklist for #a: 'bob' and 'evn'"),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_handlers_run_in_enable_and_arrival_order() {
    let h = Harness::new();
    h.add_recorder("A", vec![EventKind::Joined], vec![], Behaviour::Yield);
    h.add_recorder("B", vec![EventKind::Joined], vec![], Behaviour::Ok);

    let mut handles = Vec::new();
    for n in 0..300 {
        handles.push(h.conn.handle_event(Event::Joined { channel: format!("#c{}", n) }).await);
    }
    for handle in handles {
        assert_eq!(handle.wait().await, DispatchReport { invoked: 2, failed: 0 });
    }

    let expected: Vec<String> = (0..300)
        .flat_map(|n| {
            [
                format!("A:joined:#c{}:in=true", n),
                format!("B:joined:#c{}:in=true", n),
            ]
        })
        .collect();
    assert_eq!(h.seen(), expected);
}

#[tokio::test]
async fn test_suspended_handler_does_not_hold_up_the_next() {
    let h = Harness::new();
    h.add_recorder("Slow", vec![EventKind::Privmsg], vec![], Behaviour::Yield);
    h.add_recorder("Quick", vec![EventKind::Privmsg], vec![], Behaviour::Ok);

    let handle = h
        .conn
        .handle_event(Event::Privmsg {
            user: "bob!b@host".into(),
            channel: "#a".into(),
            message: "hi".into(),
        })
        .await;

    assert_eq!(h.seen(), vec!["Slow:privmsg", "Quick:privmsg"]);
    assert_eq!(handle.len(), 2);
    assert_eq!(handle.in_flight(), 1);
    assert_eq!(handle.wait().await, DispatchReport { invoked: 2, failed: 0 });
}
