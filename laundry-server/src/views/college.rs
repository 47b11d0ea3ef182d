//! College page: machine grids per kind and, optionally, the modal for one machine.

use laundry_core::{CommandKind, Machine, MachineKind};

use super::{escape, path_segment, query_value};
use crate::session::{CollegeSession, Modal};

const COLLEGE_HTML_TEMPLATE: &str = include_str!("college.html");

fn machine_card(college: &str, machine: &Machine) -> String {
    format!(
        "            <a class=\"machine {}\" href=\"/{}?machine={}\">\
         <span class=\"number\">{}</span>\
         <span class=\"status\">{}</span></a>",
        machine.status.css_class(),
        path_segment(college),
        query_value(&machine.id),
        escape(&machine.number),
        machine.status.label(machine.kind)
    )
}

fn machine_section(college: &str, kind: MachineKind, machines: &[Machine]) -> String {
    let cards = machines
        .iter()
        .map(|m| machine_card(college, m))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "    <section id=\"{}\">\n        <h2>{}s</h2>\n        <div class=\"grid\">\n{}\n        </div>\n    </section>",
        kind.plural(),
        kind.title(),
        cards
    )
}

fn command_form(action_url: &str, command: CommandKind, targets: &[Machine]) -> Option<String> {
    let hidden = format!(
        "<input type=\"hidden\" name=\"command\" value=\"{}\">",
        command.as_str()
    );
    let button = format!("<button type=\"submit\">{}</button>", command.label());

    let picker = match command {
        CommandKind::MoveToDryer | CommandKind::MoveToBin => {
            // No available target means no move option at all.
            if targets.is_empty() {
                return None;
            }
            let options = targets
                .iter()
                .map(|t| {
                    format!(
                        "<option value=\"{}\">{} #{}</option>",
                        escape(&t.id),
                        t.kind.title(),
                        escape(&t.number)
                    )
                })
                .collect::<String>();
            format!("<select name=\"target\" aria-label=\"Target\">{}</select> ", options)
        }
        _ => String::new(),
    };

    Some(format!(
        "            <form method=\"post\" action=\"{}\">{}{}{}</form>",
        action_url, hidden, picker, button
    ))
}

fn modal_overlay(college: &str, modal: &Modal) -> String {
    let machine = &modal.machine;
    let action_url = format!(
        "/{}/machines/{}",
        path_segment(college),
        path_segment(&machine.id)
    );
    let forms = modal
        .commands
        .iter()
        .filter_map(|&command| command_form(&action_url, command, &modal.targets))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "    <div class=\"modal-backdrop\">\n        <div class=\"modal\" role=\"dialog\" data-action=\"{}\">\n            <h2>{} #{}</h2>\n            <p>{}</p>\n{}\n            <a class=\"close\" href=\"/{}\">Close</a>\n        </div>\n    </div>",
        modal.action,
        machine.kind.title(),
        escape(&machine.number),
        modal.action.prompt(),
        forms,
        path_segment(college)
    )
}

/// Render the page for a loaded session.
pub fn render(session: &CollegeSession, modal: Option<&Modal>, version: &str) -> String {
    let college = session.college();
    let view = session.view();

    let sections = MachineKind::ALL
        .iter()
        .map(|&kind| machine_section(college, kind, view.list(kind)))
        .collect::<Vec<_>>()
        .join("\n");
    let modal = modal
        .map(|m| modal_overlay(college, m))
        .unwrap_or_default();
    let timestamp = chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string();

    // The college name goes in last so nothing inserted earlier is rescanned for it.
    COLLEGE_HTML_TEMPLATE
        .replace("{sections}", &sections)
        .replace("{modal}", &modal)
        .replace("{timestamp}", &timestamp)
        .replace("{version}", &escape(version))
        .replace("{name}", &escape(&laundry_core::college::display_name(college)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_data::MockStore;
    use crate::store::{InMemoryStore, MachineStore};
    use laundry_core::Status;
    use std::sync::Arc;

    async fn loaded(college: &str) -> (CollegeSession, Arc<InMemoryStore>) {
        let remote = Arc::new(InMemoryStore::new());
        let mut session =
            CollegeSession::new(college, remote.clone(), Arc::new(MockStore::new()));
        session.load().await;
        (session, remote)
    }

    #[tokio::test]
    async fn test_renders_all_machines() {
        let (session, _) = loaded("willrice").await;
        let html = render(&session, None, "dev");
        assert!(html.contains("<h1>Will Rice</h1>"));
        assert_eq!(html.matches("class=\"machine ").count(), 30);
        assert!(html.contains("href=\"/willrice?machine=mock-willrice-dryer-7\""));
        assert!(!html.contains("modal-backdrop"));
    }

    #[tokio::test]
    async fn test_modal_offers_commands() {
        let (session, _) = loaded("baker").await;
        let modal = session.modal("mock-baker-washer-2").unwrap();
        let html = render(&session, Some(&modal), "dev");
        assert!(html.contains("data-action=\"start_washer\""));
        assert!(html.contains("action=\"/baker/machines/mock-baker-washer-2\""));
        assert!(html.contains("value=\"start_load\""));
        assert!(html.contains("value=\"report_broken\""));
    }

    #[tokio::test]
    async fn test_move_hidden_without_targets() {
        let (mut session, remote) = loaded("baker").await;
        remote
            .set_status("mock-baker-washer-1", Status::IN_USE)
            .await
            .unwrap();
        for n in 1..=10 {
            remote
                .set_status(&format!("mock-baker-dryer-{}", n), Status::IN_USE)
                .await
                .unwrap();
        }
        session.load().await;

        let modal = session.modal("mock-baker-washer-1").unwrap();
        let html = render(&session, Some(&modal), "dev");
        assert!(!html.contains("value=\"move_to_dryer\""));
        assert!(html.contains("value=\"stop_load\""));
    }

    #[tokio::test]
    async fn test_move_lists_available_targets() {
        let (mut session, remote) = loaded("baker").await;
        remote
            .set_status("mock-baker-dryer-1", Status::IN_USE)
            .await
            .unwrap();
        session.load().await;

        let modal = session.modal("mock-baker-dryer-1").unwrap();
        let html = render(&session, Some(&modal), "dev");
        assert!(html.contains("value=\"move_to_bin\""));
        assert_eq!(html.matches("<option value=\"mock-baker-bin-").count(), 10);
    }

    #[tokio::test]
    async fn test_placeholder_in_college_name_is_inert() {
        let mut session = CollegeSession::new(
            "{sections}",
            Arc::new(InMemoryStore::new()),
            Arc::new(MockStore::new()),
        );
        session.load().await;
        let html = render(&session, None, "dev");

        let title = &html[html.find("<title>").unwrap()..html.find("</title>").unwrap()];
        assert!(!title.contains("<section"));
        assert!(html.contains("<h1>&#123;sections&#125;</h1>"));
        assert_eq!(html.matches("<section id=").count(), 3);
    }
}
