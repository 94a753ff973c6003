//! The fixed set of handlers, one per [`AssetType`].

use tenantsync_core::{AssetKind, AssetType, Identifier, Stage};
use tenantsync_remote::Pagination;

use crate::handler::{CollectionHandler, Handler, HandlerDescriptor, SingletonHandler};

/// Descriptor for `asset_type`.
pub fn descriptor(asset_type: AssetType) -> HandlerDescriptor {
    use AssetType::*;

    let id_then_name = || vec![Identifier::field("id"), Identifier::field("name")];

    match asset_type {
        Tenant => HandlerDescriptor::new(Tenant, "tenants/settings", "").with_identifiers(Vec::new()),
        EmailProvider => {
            HandlerDescriptor::new(EmailProvider, "emails/provider", "").with_identifiers(Vec::new())
        }
        ResourceServers => HandlerDescriptor::new(ResourceServers, "resource-servers", "resource_servers")
            .with_pagination(Pagination::offset())
            .with_identifiers(vec![Identifier::field("id"), Identifier::field("identifier")])
            .strip_on_update(&["identifier"])
            .with_order(Stage::ProcessChanges, 40),
        Clients => HandlerDescriptor::new(Clients, "clients", "clients")
            .with_pagination(Pagination::offset())
            .with_identifiers(vec![Identifier::field("client_id"), Identifier::field("name")])
            .with_object_fields(&["client_metadata"])
            .with_address_field("client_id"),
        Connections => HandlerDescriptor::new(Connections, "connections", "connections")
            .with_pagination(Pagination::checkpoint())
            .with_identifiers(id_then_name())
            .with_object_fields(&["metadata"])
            .strip_on_update(&["strategy", "name"]),
        Roles => HandlerDescriptor::new(Roles, "roles", "roles")
            .with_pagination(Pagination::offset())
            .with_identifiers(id_then_name()),
        Rules => HandlerDescriptor::new(Rules, "rules", "rules")
            .with_pagination(Pagination::offset())
            .with_identifiers(id_then_name())
            .strip_on_update(&["stage"]),
        Actions => HandlerDescriptor::new(Actions, "actions/actions", "actions")
            .with_pagination(Pagination::offset())
            .with_identifiers(id_then_name()),
        ClientGrants => HandlerDescriptor::new(ClientGrants, "client-grants", "client_grants")
            .with_pagination(Pagination::offset())
            .with_identifiers(vec![
                Identifier::field("id"),
                Identifier::composite(&["client_id", "audience"]),
            ])
            .strip_on_update(&["client_id", "audience"])
            .with_order(Stage::ProcessChanges, 60),
        Organizations => HandlerDescriptor::new(Organizations, "organizations", "organizations")
            .with_pagination(Pagination::checkpoint())
            .with_identifiers(id_then_name())
            .with_object_fields(&["metadata"])
            .with_order(Stage::ProcessChanges, 70),
    }
}

/// Handler for `asset_type`, picked by its kind.
pub fn handler(asset_type: AssetType) -> Box<dyn Handler> {
    let descriptor = descriptor(asset_type);
    match asset_type.kind() {
        AssetKind::Collection => Box::new(CollectionHandler::new(descriptor)),
        AssetKind::Singleton => Box::new(SingletonHandler::new(descriptor)),
    }
}

/// One handler per known type, in declaration order.
pub fn handlers() -> Vec<Box<dyn Handler>> {
    AssetType::ALL.iter().copied().map(handler).collect()
}
