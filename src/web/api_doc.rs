use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use super::api::elements::ElementsResponse;
use super::api::error::ErrorResponse;
use super::api::passes::{NextPassResponse, PassesResponse};
use super::api::reminders::{Reminder, ReminderRequest, ReminderResponse, ReminderStatus};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::passes::list_passes,
        super::api::passes::next_pass,
        super::api::reminders::create_reminder,
        super::api::reminders::list_reminders,
        super::api::reminders::cancel_reminder,
        super::api::elements::get_elements,
        super::api::elements::put_elements,
        super::api::elements::refresh_elements,
        super::api::settings::get_settings,
        super::api::settings::update_settings,
    ),
    components(
        schemas(
            PassesResponse,
            NextPassResponse,
            ReminderRequest,
            ReminderResponse,
            ReminderStatus,
            Reminder,
            ElementsResponse,
            ErrorResponse,
            crate::predict::PassEvent,
            crate::predict::GroundStation,
            crate::elements::ElementSet,
            crate::config::TrackingConfiguration,
            crate::config::SettingsPatch,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Passwatch API",
        description = "Pass predictions and reminders for a tracked satellite",
        version = "0.1.0"
    ),
    tags(
        (name = "passes", description = "Pass prediction"),
        (name = "reminders", description = "Pass reminders"),
        (name = "elements", description = "Element text management"),
        (name = "settings", description = "Tracking configuration")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
