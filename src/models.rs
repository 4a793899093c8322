use serde::Serialize;
use serde_json::Value;

// ============ Composite envelope ============

/// A Salesforce composite call: sub-requests run in order and may refer to
/// earlier results through `@{referenceId.field}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompositeRequest {
    /// Roll back every sub-request when one of them fails.
    #[serde(rename = "allOrNone")]
    pub all_or_none: bool,
    #[serde(rename = "compositeRequest")]
    pub composite_request: Vec<CompositeSubrequest>,
}

impl CompositeRequest {
    pub fn atomic(composite_request: Vec<CompositeSubrequest>) -> Self {
        Self {
            all_or_none: true,
            composite_request,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CompositeSubrequest {
    pub method: Method,
    pub url: String,
    #[serde(rename = "referenceId")]
    pub reference_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<RecordBody>,
}

/// Body of a create sub-request, one variant per object the relay writes.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RecordBody {
    CustomerAccount(CustomerAccount),
    Contact(ContactRecord),
    SiteAccount(SiteAccount),
    AccountContactRelation(AccountContactRelation),
    Opportunity(OpportunityRecord),
    Quote(QuoteRecord),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecordType {
    #[serde(rename = "Name")]
    pub name: &'static str,
}

impl RecordType {
    pub const CUSTOMER: RecordType = RecordType { name: "Cliente" };
    pub const CONTACT: RecordType = RecordType {
        name: "SLR_rt_contacto",
    };
    pub const SITE: RecordType = RecordType { name: "Ubicación" };
    pub const INSTALLATION_OPPORTUNITY: RecordType = RecordType {
        name: "Op. Instalación",
    };
    pub const PRE_QUOTE: RecordType = RecordType { name: "Preoferta" };
}

// ============ Record bodies ============

/// Customer (`Cliente`) account.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CustomerAccount {
    #[serde(rename = "SLR_fld_masterRecordId__c")]
    pub master_record_id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Phone")]
    pub phone: String,
    #[serde(rename = "SLR_fld_tipoCliente__c")]
    pub tipo_cliente: String,
    #[serde(rename = "SLR_fld_tipoDocumento__c")]
    pub tipo_documento: String,
    #[serde(rename = "SLR_fld_numeroDocumento__c")]
    pub numero_documento: String,
    #[serde(flatten)]
    pub billing: BillingAddress,
    #[serde(rename = "RecordType")]
    pub record_type: RecordType,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BillingAddress {
    #[serde(rename = "BillingCity")]
    pub city: String,
    #[serde(rename = "BillingCountryCode")]
    pub country_code: String,
    #[serde(rename = "BillingPostalCode")]
    pub postal_code: String,
    #[serde(rename = "BillingStateCode")]
    pub state_code: String,
    #[serde(rename = "BillingStreet")]
    pub street: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContactRecord {
    #[serde(rename = "AccountId")]
    pub account_id: String,
    #[serde(rename = "FirstName")]
    pub first_name: String,
    #[serde(rename = "LastName")]
    pub last_name: String,
    #[serde(rename = "MobilePhone")]
    pub mobile_phone: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "RecordType")]
    pub record_type: RecordType,
}

/// Installation site (`Ubicación`) account, child of the customer account.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SiteAccount {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Phone")]
    pub phone: String,
    #[serde(flatten)]
    pub billing: BillingAddress,
    #[serde(rename = "ParentId")]
    pub parent_id: String,
    #[serde(rename = "RecordType")]
    pub record_type: RecordType,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AccountContactRelation {
    #[serde(rename = "AccountId")]
    pub account_id: String,
    #[serde(rename = "ContactId")]
    pub contact_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OpportunityRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "AccountId")]
    pub account_id: String,
    #[serde(rename = "SLR_fld_tipoCliente__c")]
    pub tipo_cliente: String,
    #[serde(rename = "CloseDate")]
    pub close_date: String,
    #[serde(rename = "SLR_fld_masterRecordId__c")]
    pub master_record_id: String,
    #[serde(rename = "SLR_fld_cliente__c")]
    pub customer_id: String,
    #[serde(rename = "StageName")]
    pub stage_name: String,
    #[serde(rename = "SLR_fld_distribuidor__c")]
    pub distribuidor: String,
    #[serde(
        rename = "SLR_fld_codigoDistribuidor__c",
        skip_serializing_if = "Option::is_none"
    )]
    pub codigo_distribuidor: Option<String>,
    #[serde(rename = "SLR_fld_agencia__c", skip_serializing_if = "Option::is_none")]
    pub agencia: Option<String>,
    #[serde(rename = "SLR_fld_canal__c")]
    pub canal: String,
    #[serde(rename = "SLR_fld_canalOrigen__c")]
    pub canal_origen: String,
    #[serde(rename = "SLR_fld_empresaOrigen__c")]
    pub empresa_origen: String,
    #[serde(rename = "SLR_fld_subcanal__c")]
    pub subcanal: String,
    #[serde(rename = "SLR_fld_tipologiaOrigen__c")]
    pub tipologia_origen: String,
    #[serde(rename = "SLR_fld_campanya__c")]
    pub campanya: String,
    #[serde(rename = "SLR_fld_figuraSolar__c")]
    pub figura_solar: String,
    #[serde(rename = "SLR_fld_matriculaAgente__c")]
    pub matricula_agente: String,
    #[serde(rename = "SLR_fld_codigo_instalador__c")]
    pub codigo_instalador: &'static str,
    #[serde(rename = "RecordType")]
    pub record_type: RecordType,
}

/// Pre-quote attached to the new opportunity.
///
/// Numeric fields are `None` only under the no-default policy and then go out
/// as JSON `null`. Optional text fields are left out of the body entirely.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuoteRecord {
    #[serde(rename = "SLR_fld_numPaneles__c")]
    pub num_paneles: Option<f64>,
    #[serde(rename = "SLR_fld_potenciaTotal__c")]
    pub potencia_total: Option<f64>,
    #[serde(rename = "SLR_fld_potenciaNominalIns__c")]
    pub potencia_nominal_ins: Option<f64>,
    #[serde(rename = "SLR_fld_capacidadBateria__c")]
    pub capacidad_bateria: Option<f64>,
    #[serde(rename = "SLR_fld_precioConIVA__c")]
    pub precio_con_iva: Option<f64>,
    #[serde(rename = "SLR_fld_tipoImpositivo__c")]
    pub tipo_impositivo: Option<f64>,
    /// Whole years, except on the opportunity-only quote where fractions are kept.
    #[serde(rename = "SLR_fld_paybackOferta__c")]
    pub payback_oferta: Option<Value>,
    #[serde(rename = "SLR_fld_produccionAnualEstimada__c")]
    pub produccion_anual_estimada: Option<f64>,
    #[serde(
        rename = "SLR_fld_tipoAutoconsumo__c",
        skip_serializing_if = "Option::is_none"
    )]
    pub tipo_autoconsumo: Option<String>,
    #[serde(
        rename = "SLR_fld_tipoInversor__c",
        skip_serializing_if = "Option::is_none"
    )]
    pub tipo_inversor: Option<String>,
    #[serde(
        rename = "SLR_fld_marcaInversor__c",
        skip_serializing_if = "Option::is_none"
    )]
    pub marca_inversor: Option<String>,
    #[serde(rename = "SLR_fld_marcaPanel__c", skip_serializing_if = "Option::is_none")]
    pub marca_panel: Option<String>,
    #[serde(rename = "SLR_fld_potenciaNominalPanel__c")]
    pub potencia_nominal_panel: Option<f64>,
    #[serde(
        rename = "SLR_fld_tipoInstalacionElectrica__c",
        skip_serializing_if = "Option::is_none"
    )]
    pub tipo_instalacion: Option<String>,
    #[serde(
        rename = "SLR_fld_tipoEstructura__c",
        skip_serializing_if = "Option::is_none"
    )]
    pub tipo_estructura: Option<String>,
    #[serde(
        rename = "SLR_fld_cuotaSuscripcion__c",
        skip_serializing_if = "Option::is_none"
    )]
    pub cuota_suscripcion: Option<Value>,
    #[serde(rename = "OpportunityId")]
    pub opportunity_id: String,
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Pricebook2Id")]
    pub pricebook_id: String,
    #[serde(rename = "Status", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "SLR_fld_asociadoWattwin__c")]
    pub asociado_wattwin: bool,
    #[serde(rename = "SLR_fld_comisionInstalador__c")]
    pub comision_instalador: Option<f64>,
    #[serde(
        rename = "SLR_fld_preofertaID__c",
        skip_serializing_if = "Option::is_none"
    )]
    pub preoferta_id: Option<String>,
    #[serde(rename = "RecordType")]
    pub record_type: RecordType,
}
