//! Shared helpers for delivery integration tests
#![allow(dead_code)] // Not every test binary uses every helper

pub mod mock_server;
pub mod mock_transport;

use std::{path::PathBuf, time::Duration};

use bulkmail_common::{
    config::{Config, EmailConfig},
    unit::{Row, RowGroup, UnitOfWork},
};
use bulkmail_delivery::ServerSettings;

pub const USER: &str = "user@userdomain.abc";
pub const FROM: &str = "from@userdomain.abc";
pub const BODY: &str = "The email body for student {{Name}}.";

/// Configuration with a short wait so retries do not slow the tests down.
#[must_use]
pub fn email_config(retries: u32) -> EmailConfig {
    let text = format!(
        r#"(email: (
            host: "127.0.0.1",
            user_email_address: "{USER}",
            return_address: Some("{FROM}"),
            subject: "German Saturday School Boston for {{{{Name}}}}",
            body_file: "body.txt",
            retries: {retries},
            wait_ms: 1,
            target_email_columns: ["email1", "email2"],
        ))"#
    );
    Config::from_ron(&text)
        .expect("valid email configuration")
        .email
}

#[must_use]
pub fn server() -> ServerSettings {
    ServerSettings {
        host: "127.0.0.1".to_string(),
        port: 25,
        user_name: USER.to_string(),
        password: "secret".to_string(),
        timeout: Duration::from_secs(5),
    }
}

/// One unit per student with the given recipient addresses.
#[must_use]
pub fn unit(name: &str, emails: [&str; 2], attachments: Vec<PathBuf>) -> UnitOfWork {
    let row: Row = [("email1", emails[0]), ("email2", emails[1]), ("Name", name)]
        .into_iter()
        .collect();
    let group = RowGroup::new(Some("email1".to_string()), vec![row]).expect("one row");
    UnitOfWork::new(group, attachments)
}

/// `count` units, each with two recipients.
#[must_use]
pub fn units(count: usize) -> Vec<UnitOfWork> {
    (1..=count)
        .map(|i| {
            let first = format!("p{i}@domain1.ccc");
            let second = format!("q{i}@domain2.ccc");
            unit(&format!("Student Name {i}"), [&first, &second], vec![])
        })
        .collect()
}
