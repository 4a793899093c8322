//! Request and response bodies exchanged with the Landbot/Magick chat flows.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::scenario::Scenario;

/// A text field as the chat platform sends it.
///
/// Flow variables are loosely typed: a phone or a postal code may arrive as a
/// JSON number. Scalars are stringified; `null` is treated as absent by the
/// surrounding `Option`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LooseText(pub String);

impl LooseText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for LooseText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => LooseText(s),
            Value::Number(n) => LooseText(n.to_string()),
            Value::Bool(b) => LooseText(b.to_string()),
            Value::Null => LooseText(String::new()),
            other => LooseText(other.to_string()),
        })
    }
}

/// Body of `POST /api/salesforce/duplicates`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DuplicatesRequest {
    #[serde(rename = "numDocumento")]
    pub num_documento: Option<LooseText>,
    pub cif: Option<LooseText>,
}

impl DuplicatesRequest {
    /// The identity document to search for: `numDocumento`, else `cif`, trimmed.
    pub fn document(&self) -> Option<String> {
        [&self.num_documento, &self.cif]
            .into_iter()
            .flatten()
            .map(|doc| doc.as_str().trim())
            .find(|doc| !doc.is_empty())
            .map(str::to_string)
    }
}

/// Response of `POST /api/salesforce/duplicates`.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicatesResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "MAI_composer_type_sf")]
    pub composer_type: Scenario,
    #[serde(rename = "MAI_accountid_callback_sf")]
    pub account_id_callback: String,
    /// Lookup result exactly as Salesforce returned it.
    pub sf_raw: Value,
}

/// Body of `POST /api/salesforce/create`: every flow variable the composite
/// templates read. Unknown variables are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OpportunityPayload {
    /// Scenario tag obtained from the duplicates step.
    #[serde(rename = "MAI_composer_type_sf")]
    pub composer_type: Option<LooseText>,
    /// Existing account for the partial scenarios.
    #[serde(rename = "MAI_accountid_callback_sf")]
    pub account_id_callback: Option<LooseText>,

    // Customer account
    #[serde(rename = "MAI_fld_masterRecordId__c")]
    pub master_record_id: Option<LooseText>,
    #[serde(rename = "MAI_registroID")]
    pub registro_id: Option<LooseText>,
    #[serde(rename = "MAI_name")]
    pub name: Option<LooseText>,
    #[serde(rename = "MAI_phone")]
    pub phone: Option<LooseText>,
    #[serde(rename = "MAI_fld_tipoCliente__c")]
    pub tipo_cliente: Option<LooseText>,
    #[serde(rename = "MAI_fld_tipoDocumento__c")]
    pub tipo_documento: Option<LooseText>,
    #[serde(rename = "MAI_fld_numeroDocumento__c")]
    pub numero_documento: Option<LooseText>,
    #[serde(rename = "MAI_billingCity")]
    pub billing_city: Option<LooseText>,
    #[serde(rename = "MAI_billingCountryCode")]
    pub billing_country_code: Option<LooseText>,
    #[serde(rename = "MAI_billingPostalCode")]
    pub billing_postal_code: Option<LooseText>,
    #[serde(rename = "MAI_billingStateCode")]
    pub billing_state_code: Option<LooseText>,
    #[serde(rename = "MAI_billingStreet")]
    pub billing_street: Option<LooseText>,

    // Contact
    #[serde(rename = "MAI_firstName")]
    pub first_name: Option<LooseText>,
    #[serde(rename = "MAI_lastName")]
    pub last_name: Option<LooseText>,
    #[serde(rename = "MAI_contactPhone")]
    pub contact_phone: Option<LooseText>,
    #[serde(rename = "MAI_email")]
    pub email: Option<LooseText>,

    // Site (ubicación) account
    #[serde(rename = "MAI_nameUbicacion")]
    pub site_name: Option<LooseText>,
    #[serde(rename = "MAI_phoneUbicacion")]
    pub site_phone: Option<LooseText>,
    #[serde(rename = "MAI_billingCityUbicacion")]
    pub site_billing_city: Option<LooseText>,
    #[serde(rename = "MAI_billingCountryCodeUbicacion")]
    pub site_billing_country_code: Option<LooseText>,
    #[serde(rename = "MAI_billingPostalCodeUbicacion")]
    pub site_billing_postal_code: Option<LooseText>,
    #[serde(rename = "MAI_billingStateCodeUbicacion")]
    pub site_billing_state_code: Option<LooseText>,
    #[serde(rename = "MAI_billingStreetUbicacion")]
    pub site_billing_street: Option<LooseText>,

    // Opportunity
    #[serde(rename = "MAI_opportunityName")]
    pub opportunity_name: Option<LooseText>,
    #[serde(rename = "MAI_stageName")]
    pub stage_name: Option<LooseText>,
    #[serde(rename = "MAI_closeDate")]
    pub close_date: Option<LooseText>,
    #[serde(rename = "MAI_fld_distribuidor__c")]
    pub distribuidor: Option<LooseText>,
    #[serde(rename = "MAI_fld_codigoDistribuidor__c")]
    pub codigo_distribuidor: Option<LooseText>,
    #[serde(rename = "MAI_fld_agencia__c")]
    pub agencia: Option<LooseText>,
    #[serde(rename = "MAI_fld_canal__c")]
    pub canal: Option<LooseText>,
    #[serde(rename = "MAI_fld_canalOrigen__c")]
    pub canal_origen: Option<LooseText>,
    #[serde(rename = "MAI_fld_empresaOrigen__c")]
    pub empresa_origen: Option<LooseText>,
    #[serde(rename = "MAI_fld_subcanal__c")]
    pub subcanal: Option<LooseText>,
    #[serde(rename = "MAI_fld_tipologiaOrigen__c")]
    pub tipologia_origen: Option<LooseText>,
    #[serde(rename = "MAI_fld_campanya__c")]
    pub campanya: Option<LooseText>,
    #[serde(rename = "MAI_fld_figuraSolar__c")]
    pub figura_solar: Option<LooseText>,
    #[serde(rename = "MAI_fld_matriculaAgente__c")]
    pub matricula_agente: Option<LooseText>,

    // Quote: numeric values stay raw until a template coerces them
    #[serde(rename = "MAI_fld_numPaneles__c")]
    pub num_paneles: Option<Value>,
    #[serde(rename = "MAI_fld_potenciaTotal__c")]
    pub potencia_total: Option<Value>,
    #[serde(rename = "MAI_fld_potenciaNominalIns__c")]
    pub potencia_nominal_ins: Option<Value>,
    #[serde(rename = "MAI_fld_capacidadBateria__c")]
    pub capacidad_bateria: Option<Value>,
    #[serde(rename = "MAI_fld_precioConIVA__c")]
    pub precio_con_iva: Option<Value>,
    #[serde(rename = "MAI_fld_tipoImpositivo__c")]
    pub tipo_impositivo: Option<Value>,
    #[serde(rename = "MAI_fld_paybackOferta__c")]
    pub payback_oferta: Option<Value>,
    #[serde(rename = "MAI_fld_produccionAnualEstimada__c")]
    pub produccion_anual_estimada: Option<Value>,
    #[serde(rename = "MAI_fld_potenciaNominalPanel__c")]
    pub potencia_nominal_panel: Option<Value>,
    #[serde(rename = "MAI_fld_margenBrutoComisionInstalador")]
    pub margen_comision_instalador: Option<Value>,
    /// Older flows send the installer margin without the `fld_` infix.
    #[serde(rename = "MAI_margenBrutoComisionInstalador")]
    pub margen_comision_instalador_legacy: Option<Value>,
    /// Passed through untouched.
    #[serde(rename = "MAI_fld_cuotaSuscripcion__c")]
    pub cuota_suscripcion: Option<Value>,

    #[serde(rename = "MAI_fld_tipoAutoconsumo__c")]
    pub tipo_autoconsumo: Option<LooseText>,
    #[serde(rename = "MAI_fld_tipoInversor__c")]
    pub tipo_inversor: Option<LooseText>,
    #[serde(rename = "MAI_fld_marcaInversor__c")]
    pub marca_inversor: Option<LooseText>,
    #[serde(rename = "MAI_fld_marcaPanel__c")]
    pub marca_panel: Option<LooseText>,
    #[serde(rename = "MAI_fld_tipoEstructura__c")]
    pub tipo_estructura: Option<LooseText>,
    #[serde(rename = "MAI_fld_tipoInstalacionElectrica__c")]
    pub tipo_instalacion: Option<LooseText>,
    /// Already-normalized installation type some flows send instead.
    #[serde(rename = "MAI_tipoInst")]
    pub tipo_instalacion_legacy: Option<LooseText>,
    #[serde(rename = "MAI_ofertaId")]
    pub oferta_id: Option<LooseText>,
    #[serde(rename = "MAI_status")]
    pub status: Option<LooseText>,
}

impl OpportunityPayload {
    /// The raw scenario tag, empty when the flow did not send one.
    pub fn composer_type(&self) -> &str {
        self.composer_type
            .as_ref()
            .map(|t| t.as_str().trim())
            .unwrap_or("")
    }
}

/// Response of `POST /api/salesforce/create`, also the audit record of the flow.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CreateResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "opportunityId", skip_serializing_if = "Option::is_none")]
    pub opportunity_id: Option<String>,
    #[serde(rename = "compositeResponse", skip_serializing_if = "Option::is_none")]
    pub composite_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl CreateResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Default::default()
        }
    }
}
