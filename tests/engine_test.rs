mod common;

use common::{engine, feed, RecordingSink};
use postfix_exporter::metrics::Metric;
use postfix_exporter::router::UnmatchedReason;
use postfix_exporter::Outcome;

const REMOVED: &[&str] = &[
    "Feb 11 16:49:24 letterman postfix/qmgr[8204]: AAB4D259B1: removed",
    "Feb 11 16:49:24 letterman postfix/qmgr[8204]: C2032259E6: removed",
    "Feb 11 16:49:24 letterman postfix/qmgr[8204]: B83C4257DC: removed",
    "Feb 11 16:49:24 letterman postfix/qmgr[8204]: 721BE256EA: removed",
    "Feb 11 16:49:25 letterman postfix/qmgr[8204]: CA94A259EB: removed",
    "Feb 11 16:49:25 letterman postfix/qmgr[8204]: AC1E3259E1: removed",
    "Feb 11 16:49:25 letterman postfix/qmgr[8204]: D114D221E3: removed",
    "Feb 11 16:49:25 letterman postfix/qmgr[8204]: A55F82104D: removed",
    "Feb 11 16:49:26 letterman postfix/qmgr[8204]: 289AF21DB9: removed",
    "Feb 11 16:49:27 letterman postfix/qmgr[8204]: DFE732172E: removed",
];

#[test]
fn single_removed_line() {
    let sink = RecordingSink::new();
    let engine = engine(&sink, true);

    let outcome = engine.classify(REMOVED[0]);

    assert!(outcome.is_matched());
    assert_eq!(sink.counter(Metric::QmgrRemoves, &[]), 1);
    assert_eq!(sink.touched(), vec![Metric::QmgrRemoves]);
}

#[test]
fn many_removed_lines_count_exactly() {
    let sink = RecordingSink::new();
    let engine = engine(&sink, true);

    feed(&engine, REMOVED);

    assert_eq!(sink.counter(Metric::QmgrRemoves, &[]), REMOVED.len() as u64);
    assert_eq!(sink.touched(), vec![Metric::QmgrRemoves]);
}

#[test]
fn each_sasl_phrasing_counts_once() {
    let sink = RecordingSink::new();
    let engine = engine(&sink, true);

    feed(
        &engine,
        &[
            "Apr 26 10:55:19 tcc1 postfix/smtpd[21126]: warning: SASL authentication failure: cannot connect to saslauthd server: Permission denied",
            "Apr 26 10:55:19 tcc1 postfix/smtpd[21126]: warning: SASL authentication failure: Password verification failed",
            "Apr 26 10:55:19 tcc1 postfix/smtpd[21126]: warning: laptop.local[192.168.1.2]: SASL PLAIN authentication failed: generic failure",
        ],
    );

    assert_eq!(sink.counter(Metric::SmtpdSaslAuthenticationFailures, &[]), 3);
    assert_eq!(sink.touched(), vec![Metric::SmtpdSaslAuthenticationFailures]);
}

#[test]
fn outbound_tls_tuples_get_their_own_cells() {
    let sink = RecordingSink::new();
    let engine = engine(&sink, true);

    feed(
        &engine,
        &[
            "Jul 24 04:38:17 mail postfix/smtp[30582]: Verified TLS connection established to gmail-smtp-in.l.google.com[108.177.14.26]:25: TLSv1.3 with cipher TLS_AES_256_GCM_SHA384 (256/256 bits) key-exchange X25519 server-signature RSA-PSS (2048 bits) server-digest SHA256",
            "Jul 24 03:28:15 mail postfix/smtp[24052]: Verified TLS connection established to mx2.comcast.net[2001:558:fe21:2a::6]:25: TLSv1.2 with cipher ECDHE-RSA-AES256-GCM-SHA384 (256/256 bits)",
        ],
    );

    assert_eq!(
        sink.counter(
            Metric::SmtpTlsConnects,
            &["Verified", "TLSv1.3", "TLS_AES_256_GCM_SHA384", "256", "256"]
        ),
        1
    );
    assert_eq!(
        sink.counter(
            Metric::SmtpTlsConnects,
            &["Verified", "TLSv1.2", "ECDHE-RSA-AES256-GCM-SHA384", "256", "256"]
        ),
        1
    );
    assert_eq!(sink.cells(Metric::SmtpTlsConnects), 2);
    assert_eq!(sink.counter_total(Metric::SmtpTlsConnects), 2);
}

#[test]
fn postscreen_rejects_by_code() {
    let sink = RecordingSink::new();
    let engine = engine(&sink, true);

    feed(
        &engine,
        &[
            "Feb 22 03:18:19 <hostname> postfix/postscreen[1234]: WHITELISTED [1.2.3.4]:12345",
            "Feb 22 03:20:57 <hostname> postfix/postscreen[1234]: NOQUEUE: reject: RCPT from [1.2.3.4]:12345: 550 5.7.1 Service unavailable; client [<spammers ip>] blocked using DNSBL Filters; from=<fromaddr>, to=<toaddr>, proto=ESMTP, helo=<smtp.aweia.cn>",
            "Nov 22 16:03:56 siren postfix/postscreen[8266]: NOQUEUE: reject: RCPT from [209.85.160.43]:45612: 450 4.3.2 Service currently unavailable; from=account@gmail.com, to=user@abc.com, proto=ESMTP, helo=<mail-pl0-f43.google.com>",
        ],
    );

    assert_eq!(sink.counter(Metric::PostscreenRejects, &["550"]), 1);
    assert_eq!(sink.counter(Metric::PostscreenRejects, &["450"]), 1);
    assert_eq!(sink.counter_total(Metric::PostscreenRejects), 2);
    // The WHITELISTED line has no extractor
    assert_eq!(sink.counter(Metric::UnsupportedLogEntries, &["postscreen"]), 1);
}

#[test]
fn unmatched_line_counts_under_its_process_when_enabled() {
    let sink = RecordingSink::new();
    let engine = engine(&sink, true);

    let outcome = engine.classify(
        "Feb 11 16:49:24 mx postfix/anvil[99]: statistics: max connection rate 1/60s for (smtp:1.2.3.4) at Feb 11 16:45:00",
    );

    assert_eq!(
        outcome,
        Outcome::Unmatched {
            process: "anvil",
            reason: UnmatchedReason::UnknownSubsystem,
            counted: true,
        }
    );
    assert_eq!(sink.counter(Metric::UnsupportedLogEntries, &["anvil"]), 1);
    assert_eq!(sink.touched(), vec![Metric::UnsupportedLogEntries]);
}

#[test]
fn unmatched_line_changes_nothing_when_disabled() {
    let sink = RecordingSink::new();
    let engine = engine(&sink, false);

    let outcome = engine.classify("Feb 11 16:49:24 mx postfix/anvil[99]: statistics: nothing");
    assert!(!outcome.is_matched());
    engine.classify("not a syslog line at all");

    assert!(sink.touched().is_empty());
}

#[test]
fn garbage_lines_are_unknown() {
    let sink = RecordingSink::new();
    let engine = engine(&sink, true);

    feed(&engine, &["", "garbage", "Feb 11 16:49:24 host no-pid-here: text"]);

    assert_eq!(sink.counter(Metric::UnsupportedLogEntries, &["unknown"]), 3);
}

#[test]
fn multi_instance_process_routes_by_last_component() {
    let sink = RecordingSink::new();
    let engine = engine(&sink, true);

    engine.classify("Feb 11 16:49:24 mx postfix/submission/smtpd[4242]: connect from unknown[10.0.0.1]");

    assert_eq!(sink.counter(Metric::SmtpdConnects, &[]), 1);
}

#[test]
fn delivery_with_delays_observes_every_stage() {
    let sink = RecordingSink::new();
    let engine = engine(&sink, true);

    engine.classify(
        "Feb 11 16:49:24 mx postfix/smtp[30582]: 4CF2D3F1A: to=<user@example.com>, relay=mx.example.com[1.2.3.4]:25, delay=0.12, delays=0.01/0.02/0.03/0.06, dsn=2.0.0, status=sent (250 2.0.0 OK)",
    );

    let observed = sink.observations(Metric::SmtpDelays);
    assert_eq!(
        observed,
        vec![
            (vec!["before_queue_manager".to_string()], 0.01),
            (vec!["queue_manager".to_string()], 0.02),
            (vec!["connection_setup".to_string()], 0.03),
            (vec!["transmission".to_string()], 0.06),
        ]
    );
    assert_eq!(sink.counter(Metric::SmtpDeferreds, &[]), 0);
}

#[test]
fn delay_labels_are_stage_only_whatever_the_status() {
    let sink = RecordingSink::new();
    let engine = engine(&sink, true);

    engine.classify(
        "Feb 11 16:49:24 mx postfix/smtp[30582]: 4CF2D3F1A: to=<user@example.com>, relay=none, delay=30, delays=0.1/0/30/0, dsn=4.4.1, status=deferred (connect to mx.example.com[1.2.3.4]:25: Connection timed out)",
    );
    engine.classify(
        "Feb 11 16:49:25 mx postfix/smtp[30582]: 5DA0E4F2B: to=<user@example.com>, relay=mx.example.com[1.2.3.4]:25, delay=1, delays=0.1/0/0.4/0.5, dsn=5.1.1, status=bounced (550 5.1.1 no such user)",
    );

    let observed = sink.observations(Metric::SmtpDelays);
    assert_eq!(observed.len(), 8);
    assert!(observed.iter().all(|(labels, _)| labels.len() == 1));
    assert_eq!(sink.counter(Metric::SmtpDeferreds, &[]), 1);
}

#[test]
fn malformed_delays_record_no_observation() {
    let sink = RecordingSink::new();
    let engine = engine(&sink, true);

    engine.classify(
        "Feb 11 16:49:24 mx postfix/smtp[30582]: 4CF2D3F1A: to=<user@example.com>, relay=mx.example.com[1.2.3.4]:25, delay=0.12, delays=0.01/abc/0.03/0.06, dsn=2.0.0, status=sent (250 2.0.0 OK)",
    );

    assert!(sink.observations(Metric::SmtpDelays).is_empty());
}

#[test]
fn smtpd_session_counts() {
    let sink = RecordingSink::new();
    let engine = engine(&sink, true);

    feed(
        &engine,
        &[
            "Mar  1 10:00:00 mx postfix/smtpd[100]: connect from client.example.net[192.0.2.10]",
            "Mar  1 10:00:01 mx postfix/smtpd[100]: 9A8B7C6D5E: client=client.example.net[192.0.2.10], sasl_method=PLAIN, sasl_username=alice",
            "Mar  1 10:00:01 mx postfix/smtpd[100]: 1A2B3C4D5E: client=other.example.net[192.0.2.11]",
            "Mar  1 10:00:02 mx postfix/smtpd[100]: NOQUEUE: reject: RCPT from unknown[192.0.2.12]: 554 5.7.1 <spam@example.org>: Relay access denied; from=<a@b> to=<c@d> proto=ESMTP helo=<x>",
            "Mar  1 10:00:03 mx postfix/smtpd[100]: lost connection after AUTH from unknown[192.0.2.13]",
            "Mar  1 10:00:04 mx postfix/smtpd[100]: warning: hostname mail.bad.example does not resolve to address 192.0.2.14: Name or service not known",
            "Mar  1 10:00:05 mx postfix/smtpd[100]: disconnect from client.example.net[192.0.2.10] ehlo=1 auth=0/1 quit=1 commands=2/3",
        ],
    );

    assert_eq!(sink.counter(Metric::SmtpdConnects, &[]), 1);
    assert_eq!(sink.counter(Metric::SmtpdProcesses, &["PLAIN"]), 1);
    assert_eq!(sink.counter(Metric::SmtpdProcesses, &[""]), 1);
    assert_eq!(sink.counter(Metric::SmtpdRejects, &["554"]), 1);
    assert_eq!(sink.counter(Metric::SmtpdLostConnections, &["AUTH"]), 1);
    assert_eq!(sink.counter(Metric::SmtpdLostConnections, &["auth"]), 1);
    assert_eq!(sink.counter(Metric::SmtpdFcrdnsErrors, &[]), 1);
    assert_eq!(sink.counter(Metric::SmtpdDisconnects, &[]), 1);
    assert_eq!(sink.counter_total(Metric::UnsupportedLogEntries), 0);
}

#[test]
fn reordering_independent_rejects_keeps_counts() {
    let lines = [
        "Mar  1 10:00:02 mx postfix/smtpd[100]: NOQUEUE: reject: RCPT from unknown[192.0.2.12]: 554 5.7.1 Relay access denied",
        "Mar  1 10:00:03 mx postfix/smtpd[100]: NOQUEUE: reject: RCPT from unknown[192.0.2.13]: 450 4.7.1 Try again later",
        "Mar  1 10:00:04 mx postfix/smtpd[100]: NOQUEUE: reject: RCPT from unknown[192.0.2.14]: 554 5.7.1 Relay access denied",
        "Feb 22 03:20:57 mx postfix/postscreen[1234]: NOQUEUE: reject: RCPT from [1.2.3.4]:12345: 550 5.7.1 Service unavailable",
    ];

    let forward = RecordingSink::new();
    feed(&engine(&forward, true), &lines);

    let mut reversed_lines = lines;
    reversed_lines.reverse();
    let reversed = RecordingSink::new();
    feed(&engine(&reversed, true), &reversed_lines);

    assert_eq!(forward.counter_snapshot(), reversed.counter_snapshot());
    assert_eq!(forward.counter(Metric::SmtpdRejects, &["554"]), 2);
}
