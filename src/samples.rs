//! Sample callsheets for testing and demonstration.

use crate::callsheet::{Callsheet, Contact, IntExt, ScheduleItem};

/// 1x1 PNG usable as a logo data URI.
pub const SAMPLE_LOGO: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

fn contact(name: &str, role: &str, phone: &str) -> Contact {
    Contact {
        name: name.into(),
        role: role.into(),
        phone: phone.into(),
        ..Default::default()
    }
}

fn scene(number: &str, int_ext: IntExt, description: &str, location: &str, pages: &str, time: &str) -> ScheduleItem {
    ScheduleItem {
        scene_number: number.into(),
        int_ext,
        description: description.into(),
        location: location.into(),
        page_count: pages.into(),
        estimated_time: time.into(),
    }
}

/// A small but complete shoot day: every required field set, three scenes,
/// three cast, three crew and two emergency contacts.
pub fn sample_callsheet() -> Callsheet {
    Callsheet {
        id: "cs-0001".into(),
        user_id: "user-42".into(),
        created_at: "2024-03-01T09:00:00Z".into(),
        updated_at: "2024-03-02T17:30:00Z".into(),

        project_title: "Harbor Lights".into(),
        shoot_date: "2024-03-14".into(),
        general_call_time: "06:30".into(),
        location: "Pier 39".into(),
        location_address: "Beach St & The Embarcadero, San Francisco, CA".into(),
        weather: "Fog until 10am, 58F".into(),
        parking_instructions: "Crew parking in Lot C, shuttle every 15 min".into(),
        basecamp_location: "North lot behind the aquarium".into(),
        special_notes: "Closed set after lunch. Drone flight window 14:00-15:00.".into(),
        emergency_number: "911".into(),
        nearest_hospital: Some("SF General, 1001 Potrero Ave".into()),

        schedule: vec![
            scene("12", IntExt::Ext, "Maya arrives at the pier at dawn", "Pier 39 East", "2 1/8", "07:00-09:00"),
            scene("14", IntExt::Int, "Ferry cabin argument", "Ferry Deck B", "3/8", "09:30-11:00"),
            scene("15A", IntExt::IntExt, "Chase through the fish market", "Market Hall", "1 4/8", "12:30-15:00"),
        ],
        cast: vec![
            Contact {
                email: Some("ava@example.com".into()),
                character: Some("Maya".into()),
                ..contact("Ava Chen", "Lead", "555-0101")
            },
            Contact {
                character: Some("Leo".into()),
                ..contact("Sam Ortiz", "Supporting", "555-0102")
            },
            Contact {
                email: Some("jo@example.com".into()),
                character: Some("Captain".into()),
                ..contact("Jo Park", "Day Player", "555-0103")
            },
        ],
        crew: vec![
            Contact {
                email: Some("rita@example.com".into()),
                department: Some("Directing".into()),
                ..contact("Rita Vance", "Director", "555-0201")
            },
            Contact {
                department: Some("Camera".into()),
                ..contact("Ben Ito", "DP", "555-0202")
            },
            Contact {
                department: Some("Production".into()),
                ..contact("Lena Moss", "1st AD", "555-0203")
            },
        ],
        emergency_contacts: vec![
            contact("Set Medic", "Medic", "555-0300"),
            contact("Tom Reyes", "Safety", "555-0301"),
        ],
    }
}

/// [`sample_callsheet`] with `n` extra crew, for exercising pagination.
pub fn sample_with_crew(n: usize) -> Callsheet {
    let mut sheet = sample_callsheet();
    sheet.crew.extend((0..n).map(|i| Contact {
        department: Some("Grip & Electric".into()),
        ..contact(&format!("Crew Member {i:03}"), "Grip", &format!("555-{i:04}"))
    }));
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_is_valid() {
        let sheet = sample_callsheet();
        sheet.validate().unwrap();
        assert_eq!(sheet.schedule.len(), 3);
        assert!(sheet.nearest_hospital.is_some());
    }

    #[test]
    fn extra_crew_is_appended() {
        assert_eq!(sample_with_crew(10).crew.len(), 13);
    }
}
